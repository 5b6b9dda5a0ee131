use std::fmt::{Display, Formatter};

use futures::future::BoxFuture;

/// The HTTP methods that a request group can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let method = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(method)
    }
}

/// A fully built request, ready to be handed to a [Transport].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Path relative to the base URL the transport was configured with, e.g. `/api/login`.
    pub path: String,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
}

/// Where a request came from. Lets a transport, or a stub standing in for one, vary its behaviour
/// with the load that is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestMeta {
    pub vu_id: usize,
    pub iteration: u64,
    /// The number of virtual users that were live when the request was sent.
    pub active_vus: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Could not connect: {0}")]
    Connect(String),
    #[error("Request failed: {0}")]
    Other(String),
}

pub type TransportFuture<'a> = BoxFuture<'a, Result<HttpResponse, TransportError>>;

/// Sends requests to the system under test.
///
/// Implementations must be cheap to share between virtual users, each virtual user holds an
/// `Arc<dyn Transport>`.
pub trait Transport: Send + Sync + 'static {
    fn send<'a>(&'a self, request: &'a HttpRequest, meta: RequestMeta) -> TransportFuture<'a>;
}
