//! Target resolution and single-host forwarding.
//!
//! The dispatcher turns a [`RouteDecision`] into an outbound request against the snapshot
//! captured for that request, hands it to the [`HttpClient`] port and returns the backend's
//! response with its body still streaming.
use std::{net::SocketAddr, sync::Arc};

use axum::body::Body as AxumBody;
use http::{
    HeaderMap, HeaderName, HeaderValue, Request, Response,
    header::{self, HOST},
};
use thiserror::Error;

use crate::{
    core::{
        router::RouteDecision,
        store::Snapshot,
        target::{Target, TargetError},
    },
    ports::http_client::{HttpClient, HttpClientError},
};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Errors produced while resolving or forwarding a request
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DispatchError {
    /// The routing key has no entry in the active table
    #[error("unknown route key '{key}'")]
    UnknownRouteKey { key: String },

    /// The matched route's target cannot be used
    #[error("route '{key}' has an invalid target URL '{target}': {source}")]
    InvalidTargetUrl {
        key: String,
        target: String,
        #[source]
        source: TargetError,
    },

    /// The rewritten path/query did not form a valid URI
    #[error("failed to build outbound URI: {0}")]
    OutboundUri(#[from] http::Error),

    /// The backend could not be reached
    #[error("backend request failed: {0}")]
    Upstream(#[from] HttpClientError),
}

/// Forwards requests to the target selected by the routing key.
#[derive(Clone)]
pub struct Dispatcher {
    http_client: Arc<dyn HttpClient>,
}

impl Dispatcher {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// Look up `key` in `snapshot` and return its parsed target.
    pub fn resolve<'a>(snapshot: &'a Snapshot, key: &str) -> Result<&'a Target, DispatchError> {
        match snapshot.target(key) {
            Some(Ok(target)) => Ok(target),
            Some(Err(source)) => Err(DispatchError::InvalidTargetUrl {
                key: key.to_string(),
                target: snapshot
                    .config()
                    .routes
                    .get(key)
                    .cloned()
                    .unwrap_or_default(),
                source: source.clone(),
            }),
            None => Err(DispatchError::UnknownRouteKey {
                key: key.to_string(),
            }),
        }
    }

    /// Forward `req` according to `decision`, using only `snapshot` for lookups.
    pub async fn forward(
        &self,
        snapshot: &Snapshot,
        decision: &RouteDecision,
        mut req: Request<AxumBody>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response<AxumBody>, DispatchError> {
        let target = Self::resolve(snapshot, &decision.key)?;

        let outbound_uri = target.outbound_uri(&decision.rewritten_path, req.uri().query())?;
        let original_host = req
            .headers()
            .get(HOST)
            .cloned()
            .or_else(|| {
                req.uri()
                    .authority()
                    .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
            });

        tracing::debug!(
            backend = %target.origin(),
            "Forwarding {} {} to {}",
            req.method(),
            req.uri(),
            outbound_uri
        );
        *req.uri_mut() = outbound_uri;
        rewrite_request_headers(req.headers_mut(), target, original_host, client_addr);

        let mut response = self.http_client.send_request(req).await?;
        remove_hop_by_hop_headers(response.headers_mut());
        Ok(response)
    }
}

fn rewrite_request_headers(
    headers: &mut HeaderMap,
    target: &Target,
    original_host: Option<HeaderValue>,
    client_addr: Option<SocketAddr>,
) {
    remove_hop_by_hop_headers(headers);

    if let Ok(host) = HeaderValue::from_str(target.authority().as_str()) {
        headers.insert(HOST, host);
    }

    if let Some(addr) = client_addr {
        let client_ip = addr.ip().to_string();
        let prior: Vec<&str> = headers
            .get_all(&X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let forwarded_for = if prior.is_empty() {
            client_ip
        } else {
            format!("{}, {client_ip}", prior.join(", "))
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
}

/// Strip connection-scoped headers, including any named by `Connection`.
fn remove_hop_by_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}
