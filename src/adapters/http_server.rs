use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Request},
    http::Request as HttpRequest,
    response::Response,
};
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{adapters::HttpHandler, tracing_setup::create_request_span};

/// Build the axum application: every method and path goes to the proxy handler.
pub fn build_router(handler: Arc<HttpHandler>) -> Router {
    let proxy = move |ConnectInfo(client_addr): ConnectInfo<SocketAddr>, req: Request| {
        let handler = handler.clone();
        async move { handler.handle_request(req, Some(client_addr)).await }
    };

    Router::new().fallback(proxy).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &HttpRequest<Body>| {
                let request_id = uuid::Uuid::new_v4().to_string();
                create_request_span(req.method().as_str(), req.uri().path(), &request_id)
            })
            .on_response(
                |response: &Response, latency: std::time::Duration, span: &tracing::Span| {
                    span.record("http.status_code", response.status().as_u16());
                    tracing::info!(
                        latency_ms = latency.as_millis() as u64,
                        "Finished with status {}",
                        response.status()
                    );
                },
            ),
    )
}

/// Serve proxy traffic on `listener` until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<F>(listener: TcpListener, handler: Arc<HttpHandler>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(handler);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .wrap_err("Server error")
}
