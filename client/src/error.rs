//! Error types for the datasets API client.
//!
//! # Design
//! Each status the service answers with deliberately (400, 409, 401) gets
//! a dedicated variant because callers branch on them differently: bad
//! credentials mean "stop and re-auth", a conflict is often safe to ignore,
//! and an invalid request is a caller bug. Structured service errors keep
//! their message (`Api`); everything the classifier cannot interpret lands
//! in `FailedRequest`. Transport failures (DNS, TLS, resets, expired
//! deadlines) stay a separate kind and are never folded into the HTTP
//! taxonomy, so "maybe retry" remains distinguishable from "will fail
//! again".

use std::fmt;

use serde::Deserialize;

/// Errors returned by [`Client`](crate::Client) constructors and operations.
#[derive(Debug)]
pub enum Error {
    /// The service answered 400: the request payload is malformed.
    InvalidRequest,

    /// The service answered 409: the request conflicts with existing
    /// resource state (e.g. redeclaring a dataset with a different schema).
    RequestConflict,

    /// The service answered 401: the API key is bad or was revoked.
    BadCredentials,

    /// An error response arrived without a JSON content type, so its body
    /// cannot be trusted to carry a structured message.
    InvalidResponseType,

    /// An unexpected status without a parseable error envelope, or any
    /// other failure the classifier has no better name for.
    FailedRequest,

    /// A structured error reported by the service, message included.
    Api(ApiError),

    /// The request never produced a usable response: connection, TLS or
    /// DNS failure, or an expired per-call deadline.
    Transport(TransportError),

    /// The request body could not be encoded to JSON before dispatch.
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRequest => write!(f, "the service rejected the request as invalid"),
            Error::RequestConflict => write!(f, "the request conflicts with existing resource state"),
            Error::BadCredentials => write!(f, "the service rejected the API key"),
            Error::InvalidResponseType => {
                write!(f, "error response did not declare a JSON content type")
            }
            Error::FailedRequest => write!(f, "request failed with an unclassifiable response"),
            Error::Api(e) => write!(f, "service error: {e}"),
            Error::Transport(e) => write!(f, "{e}"),
            Error::Serialization(msg) => write!(f, "failed to encode request body: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// A structured error message reported by the service.
///
/// Decoded from the `{"error": {"message": ...}}` envelope the service
/// attaches to failure responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// Wire shape of the service's failure responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: ApiError,
}

/// A failure below the HTTP layer, reported by the transport.
#[derive(Debug)]
pub enum TransportError {
    /// The per-call deadline expired before a response arrived.
    DeadlineExceeded,

    /// The transport could not complete the exchange.
    Failed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::DeadlineExceeded => {
                write!(f, "deadline exceeded before the request completed")
            }
            TransportError::Failed(msg) => write!(f, "transport failure: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}
