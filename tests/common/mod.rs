// Shared fixtures for the end-to-end tests: echo backends and a proxy on ephemeral ports.
#![allow(dead_code)]

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use telepath::{
    adapters::{HttpClientAdapter, HttpHandler, http_server},
    config::RoutingConfig,
    core::ConfigStore,
    ports::http_client::HttpClient,
};
use tokio::net::TcpListener;

/// Start a backend that answers every request with a JSON description of what it received.
///
/// `/teapot` answers 418 with an `x-backend` header, `/slow` waits before answering.
pub async fn spawn_backend(name: &'static str) -> SocketAddr {
    async fn echo(State(name): State<&'static str>, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        if parts.uri.path() == "/slow" {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_default();
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let seen = json!({
            "backend": name,
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "host": header("host"),
            "x_forwarded_for": header("x-forwarded-for"),
            "x_forwarded_host": header("x-forwarded-host"),
            "x_forwarded_proto": header("x-forwarded-proto"),
            "connection": header("connection"),
            "body": String::from_utf8_lossy(&body),
        });

        if parts.uri.path() == "/teapot" {
            return (StatusCode::IM_A_TEAPOT, [("x-backend", name)], Json(seen)).into_response();
        }
        Json(seen).into_response()
    }

    let app = Router::new().fallback(echo).with_state(name);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start the proxy in front of `store` and return its address.
pub async fn spawn_proxy(store: Arc<ConfigStore>) -> SocketAddr {
    let http_client: Arc<dyn HttpClient> = Arc::new(HttpClientAdapter::new().unwrap());
    let handler = Arc::new(HttpHandler::new(store, http_client));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        http_server::serve(listener, handler, std::future::pending())
            .await
            .unwrap();
    });
    addr
}

/// Store backed by an in-memory table; `reload` is not used with it.
pub fn store_with(config: RoutingConfig) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::with_config("unused.json", config))
}

pub async fn write_table(path: &Path, table: &Value) {
    tokio::fs::write(path, serde_json::to_vec_pretty(table).unwrap())
        .await
        .unwrap();
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Which backend answered, or `None` when the proxy itself answered.
pub async fn backend_of(response: reqwest::Response) -> Option<String> {
    let body: Value = response.json().await.ok()?;
    body["backend"].as_str().map(str::to_owned)
}

/// Poll `url` until `backend` answers, for reloads that land asynchronously.
pub async fn wait_for_backend(url: &str, backend: &str) -> bool {
    let client = client();
    for _ in 0..50 {
        if let Ok(response) = client.get(url).send().await {
            if backend_of(response).await.as_deref() == Some(backend) {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
