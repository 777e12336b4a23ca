use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body as AxumBody,
    response::{IntoResponse, Response},
};
use hyper::Request;

use crate::{
    core::{ConfigStore, Dispatcher, router},
    error::ProxyError,
    ports::http_client::HttpClient,
};

/// HTTP handler for the Telepath proxy
#[derive(Clone)]
pub struct HttpHandler {
    store: Arc<ConfigStore>,
    dispatcher: Dispatcher,
}

impl HttpHandler {
    pub fn new(store: Arc<ConfigStore>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            store,
            dispatcher: Dispatcher::new(http_client),
        }
    }

    /// Route and forward one request.
    ///
    /// The active snapshot is captured once here and used for the whole request, so a
    /// reload that lands mid-request does not affect it.
    pub async fn handle_request(
        &self,
        req: Request<AxumBody>,
        client_addr: Option<SocketAddr>,
    ) -> Response<AxumBody> {
        let snapshot = self.store.current();
        let span = tracing::Span::current();
        span.record("snapshot.generation", snapshot.generation());

        let result = match router::route(&req, snapshot.config()) {
            Ok(decision) => {
                span.record("route.key", decision.key.as_str());
                self.dispatcher
                    .forward(&snapshot, &decision, req, client_addr)
                    .await
                    .map_err(ProxyError::from)
            }
            Err(e) => Err(ProxyError::from(e)),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    tracing::error!(status = status.as_u16(), "Request failed: {}", e);
                } else {
                    tracing::warn!(status = status.as_u16(), "Request rejected: {}", e);
                }
                e.into_response()
            }
        }
    }
}
