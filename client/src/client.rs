//! Authenticated client for the datasets API.
//!
//! # Design
//! `Client` is a stateless value: base URL, auth key, optional user agent
//! and a shared transport handle. Construction performs one verification
//! `GET` against the service root so a bad key fails during setup rather
//! than on the first dataset call. Every operation funnels through
//! `do_request`, which owns header assembly, deadline threading, dispatch
//! and response classification; the operations themselves only pick a
//! method, a path and a body.
//!
//! Success responses are never parsed: the service returns nothing the
//! lifecycle operations need, so their bodies are dropped unread.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::debug;
use serde::Serialize;

use crate::deadline::Deadline;
use crate::error::{Error, ErrorEnvelope, TransportError};
use crate::http::{shared_transport, HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::types::{Batch, Record, Schema};

/// Base URL of the production service.
pub const DEFAULT_API_URL: &str = "https://api.geckoboard.com";

/// A verified handle to the datasets API.
///
/// Cheap to clone and safe to share across threads; no per-call state is
/// kept. A `Client` only exists after its construction-time verification
/// call succeeded, so holding one means the API key was valid at that
/// point. A key revoked later surfaces as [`Error::BadCredentials`] from
/// whichever operation trips over it.
#[derive(Clone)]
pub struct Client {
    api_url: String,
    auth_key: String,
    user_agent: Option<String>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Connect to the production service with `auth_key`.
    ///
    /// Performs the verification call; returns the classified error if the
    /// key is rejected or the service is unreachable.
    pub fn new(auth_key: &str) -> Result<Self, Error> {
        Self::custom(DEFAULT_API_URL, auth_key, None)
    }

    /// Like [`Client::new`], additionally sending `agent` as the
    /// `User-Agent` header on every request.
    pub fn with_user_agent(auth_key: &str, agent: &str) -> Result<Self, Error> {
        Self::custom(DEFAULT_API_URL, auth_key, Some(agent))
    }

    /// Connect to an alternate base URL, such as a staging deployment or
    /// a test double. A trailing slash on `api_url` is ignored.
    pub fn custom(api_url: &str, auth_key: &str, user_agent: Option<&str>) -> Result<Self, Error> {
        Self::with_transport(api_url, auth_key, user_agent, shared_transport())
    }

    /// Connect through a caller-supplied [`Transport`] instead of the
    /// process-wide default. The verification call runs through it like
    /// every other request.
    pub fn with_transport(
        api_url: &str,
        auth_key: &str,
        user_agent: Option<&str>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let client = Client {
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_key: auth_key.to_string(),
            user_agent: user_agent.map(str::to_string),
            transport,
        };
        client.verify(Deadline::none())?;
        Ok(client)
    }

    /// Declare (or redeclare) the dataset `dataset_id` with `schema`.
    ///
    /// The request is an idempotent upsert: redeclaring an existing dataset
    /// with the same schema succeeds, while declaring it with a different
    /// one yields [`Error::RequestConflict`].
    pub fn create(&self, deadline: Deadline, dataset_id: &str, schema: &Schema) -> Result<(), Error> {
        let body = encode(schema)?;
        self.do_request(
            deadline,
            HttpMethod::Put,
            &format!("/datasets/{dataset_id}"),
            Some(body),
        )?;
        Ok(())
    }

    /// Append `batch` to the dataset.
    ///
    /// Records matching existing ones on the schema's `unique_by` key
    /// update in place; `batch.delete_by` is honored by the service to
    /// prune matching existing records in the same call.
    pub fn push_data(&self, deadline: Deadline, dataset_id: &str, batch: &Batch) -> Result<(), Error> {
        let body = encode(batch)?;
        self.do_request(
            deadline,
            HttpMethod::Post,
            &format!("/datasets/{dataset_id}/data"),
            Some(body),
        )?;
        Ok(())
    }

    /// Replace the dataset's entire contents with `batch.records`.
    ///
    /// Deletion criteria have no meaning when replacing: `batch.delete_by`
    /// is not transmitted.
    pub fn replace_data(&self, deadline: Deadline, dataset_id: &str, batch: &Batch) -> Result<(), Error> {
        let body = encode(&ReplaceBody {
            data: &batch.records,
        })?;
        self.do_request(
            deadline,
            HttpMethod::Put,
            &format!("/datasets/{dataset_id}/data"),
            Some(body),
        )?;
        Ok(())
    }

    /// Delete the dataset and its data. Irreversible.
    pub fn delete(&self, deadline: Deadline, dataset_id: &str) -> Result<(), Error> {
        self.do_request(
            deadline,
            HttpMethod::Delete,
            &format!("/datasets/{dataset_id}"),
            None,
        )?;
        Ok(())
    }

    /// The construction-time liveness/auth check: a bare `GET` against the
    /// service root.
    fn verify(&self, deadline: Deadline) -> Result<(), Error> {
        self.do_request(deadline, HttpMethod::Get, "/", None)?;
        Ok(())
    }

    /// Shared request primitive: build the request, attach credentials,
    /// apply the deadline, dispatch, classify the response.
    fn do_request(
        &self,
        deadline: Deadline,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> Result<HttpResponse, Error> {
        if deadline.is_expired() {
            return Err(Error::Transport(TransportError::DeadlineExceeded));
        }

        let url = format!("{}{}", self.api_url, path);
        let mut headers = vec![
            ("authorization".to_string(), basic_auth(&self.auth_key)),
            ("content-type".to_string(), "application/json".to_string()),
        ];
        if let Some(agent) = &self.user_agent {
            headers.push(("user-agent".to_string(), agent.clone()));
        }

        debug!("{method} {url}");
        let response = self
            .transport
            .send(HttpRequest {
                method,
                url,
                headers,
                body,
                timeout: deadline.remaining(),
            })
            .map_err(Error::Transport)?;
        debug!("{method} {path} -> {}", response.status);

        classify(response)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The auth key stays out of debug output.
        f.debug_struct("Client")
            .field("api_url", &self.api_url)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// Replace requests carry records only; deletion criteria never ride along.
#[derive(Serialize)]
struct ReplaceBody<'a> {
    data: &'a [Record],
}

fn encode<T: Serialize>(body: &T) -> Result<String, Error> {
    serde_json::to_string(body).map_err(|e| Error::Serialization(e.to_string()))
}

/// `Authorization` header value: HTTP basic with the key as username and an
/// empty password.
fn basic_auth(auth_key: &str) -> String {
    let token = STANDARD.encode(format!("{auth_key}:"));
    format!("Basic {token}")
}

/// Map a response onto the error taxonomy.
///
/// Success bodies pass through unparsed. For error statuses beyond the
/// three the service answers with deliberately, the body is only decoded
/// when the content type says JSON; anything else cannot be trusted to
/// carry the error envelope. Informational and redirect statuses are not
/// expected here (the transport follows redirects) and classify as
/// `FailedRequest` rather than having their bodies decoded.
fn classify(response: HttpResponse) -> Result<HttpResponse, Error> {
    match response.status {
        200..=299 => Ok(response),
        409 => Err(Error::RequestConflict),
        400 => Err(Error::InvalidRequest),
        401 => Err(Error::BadCredentials),
        status if status >= 400 => {
            if !response.content_type().contains("application/json") {
                return Err(Error::InvalidResponseType);
            }
            match serde_json::from_str::<ErrorEnvelope>(&response.body) {
                Ok(envelope) => Err(Error::Api(envelope.error)),
                Err(_) => Err(Error::FailedRequest),
            }
        }
        _ => Err(Error::FailedRequest),
    }
}
