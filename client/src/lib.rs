//! Synchronous client for the Geckoboard datasets API.
//!
//! # Overview
//! Declares datasets (named, typed, keyed record collections), streams
//! records into them and tears them down, speaking the service's JSON
//! dialect over authenticated HTTP. Construction verifies the API key with
//! a probe request, so a `Client` in hand is a working session.
//!
//! # Design
//! - `Client` is a small immutable value: base URL, key, optional user
//!   agent, shared transport. Cloning is cheap; all operations take
//!   `&self`.
//! - HTTP execution sits behind the `Transport` trait. Production code
//!   uses one process-wide `UreqTransport`; tests substitute scripted
//!   transports and never open a socket.
//! - Every call takes a [`Deadline`], checked before dispatch and handed
//!   to the transport as the remaining time budget.
//! - Schemas are built from the [`Field`] sum type; records stay loose
//!   (`serde_json` maps) since their shape is the dataset's business, not
//!   the client's.

pub mod client;
pub mod deadline;
pub mod error;
pub mod http;
pub mod types;

pub use client::{Client, DEFAULT_API_URL};
pub use deadline::Deadline;
pub use error::{ApiError, Error, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{Batch, Field, Record, Schema};
