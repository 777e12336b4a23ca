use async_trait::async_trait;
use axum::body::Body as AxumBody;
use hyper::{Request, Response};
use thiserror::Error;

/// Failure to get a response from a backend.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Connecting, writing the request or reading the response head failed
    #[error("backend {backend} unreachable: {reason}")]
    Unreachable { backend: String, reason: String },

    /// The outbound URI cannot be sent (no host to connect to)
    #[error("outbound URI '{uri}' has no host")]
    MissingHost { uri: String },
}

pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// Sends fully rewritten requests to backends.
///
/// The dispatcher owns all header and URI rewriting; implementations only move bytes.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send `req` to the host named in its absolute URI and return the backend's response
    /// with a streaming body.
    async fn send_request(&self, req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>>;
}
