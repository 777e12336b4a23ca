use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response, Version};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls::RootCertStore;
use rustls_native_certs::load_native_certs;
use tracing::Instrument;

use crate::{
    ports::http_client::{HttpClient, HttpClientError, HttpClientResult},
    tracing_setup::create_backend_span,
};

/// Backend client: one pooled hyper client shared by every target.
///
/// Plain `http` and `https` targets both work; HTTPS uses the platform's native roots.
/// Bodies stream in both directions.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
}

impl HttpClientAdapter {
    pub fn new() -> Result<Self> {
        // Another component may already have installed a provider
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(native_root_store())
            .with_no_client_auth();

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(connector);
        Ok(Self { client })
    }
}

fn native_root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let native = load_native_certs();
    if !native.errors.is_empty() {
        tracing::warn!("Some native certificates failed to load: {:?}", native.errors);
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    if ignored > 0 {
        tracing::warn!("Ignored {} unparsable native root certificates", ignored);
    }
    tracing::debug!("Loaded {} native root certificates", added);
    roots
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(&self, req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>> {
        let Some(authority) = req.uri().authority().cloned() else {
            return Err(HttpClientError::MissingHost {
                uri: req.uri().to_string(),
            });
        };
        let backend = format!(
            "{}://{}",
            req.uri().scheme_str().unwrap_or("http"),
            authority
        );
        let span = create_backend_span(&backend, req.method().as_str(), req.uri().path());

        // Backends are always spoken to over HTTP/1.1, whatever the client used
        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;
        let req = Request::from_parts(parts, body);

        async move {
            let response = self.client.request(req).await.map_err(|e| {
                tracing::error!("Backend {} unreachable: {}", backend, e);
                HttpClientError::Unreachable {
                    backend: backend.clone(),
                    reason: e.to_string(),
                }
            })?;
            tracing::Span::current().record("http.status_code", response.status().as_u16());
            Ok(response.map(AxumBody::new))
        }
        .instrument(span)
        .await
    }
}
