//! HTTP transport seam: plain-data requests/responses and the `Transport`
//! trait.
//!
//! # Design
//! The client describes every exchange as an [`HttpRequest`] and interprets
//! the [`HttpResponse`] that comes back; the [`Transport`] in between is
//! injectable. Requests and responses are owned plain data, so a test
//! transport is a few lines of code and never touches the network. The
//! default [`UreqTransport`] wraps a `ureq` agent with status-as-error
//! disabled, so non-2xx responses come back as data for the client to
//! classify, and only connection-level problems surface as transport
//! errors.
//!
//! Default-constructed clients share one process-wide agent (and its
//! connection pool); see `shared_transport`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::error::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Built by the client with authentication and content-type headers already
/// attached. `timeout` is the remaining per-call budget: a transport must
/// give up with [`TransportError::DeadlineExceeded`] once it elapses.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// The declared `Content-Type`, or `""` when the header is absent.
    /// Header names match case-insensitively.
    pub fn content_type(&self) -> &str {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }
}

/// Executes HTTP exchanges on behalf of the client.
///
/// Implementations must be safe to share across threads; one instance
/// backs every call made through the clients holding it. A transport
/// reports only transport-level failures; any response it obtains, error
/// status or not, is returned as data.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// The default transport: a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// A transport over a fresh agent (own connection pool, default
    /// timeouts). Status codes never surface as `ureq` errors; the client
    /// classifies them.
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        let result = match (method, body) {
            (HttpMethod::Get, _) => {
                let mut builder = self.agent.get(&url);
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if let Some(timeout) = timeout {
                    builder = builder.config().timeout_global(Some(timeout)).build();
                }
                builder.call()
            }
            (HttpMethod::Delete, _) => {
                let mut builder = self.agent.delete(&url);
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if let Some(timeout) = timeout {
                    builder = builder.config().timeout_global(Some(timeout)).build();
                }
                builder.call()
            }
            (HttpMethod::Post, body) => {
                let mut builder = self.agent.post(&url);
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if let Some(timeout) = timeout {
                    builder = builder.config().timeout_global(Some(timeout)).build();
                }
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            (HttpMethod::Put, body) => {
                let mut builder = self.agent.put(&url);
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if let Some(timeout) = timeout {
                    builder = builder.config().timeout_global(Some(timeout)).build();
                }
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(to_transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(to_transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_transport_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::DeadlineExceeded,
        other => TransportError::Failed(other.to_string()),
    }
}

/// The process-wide default transport handed to clients that do not inject
/// their own. All such clients reuse one agent and its connection pool.
pub(crate) fn shared_transport() -> Arc<dyn Transport> {
    static SHARED: OnceLock<Arc<UreqTransport>> = OnceLock::new();
    SHARED.get_or_init(|| Arc::new(UreqTransport::new())).clone()
}
