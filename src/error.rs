use axum::{
    body::Body as AxumBody,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::core::{dispatcher::DispatchError, router::RouteError};

/// Per-request failure, reported to the caller and never shared with other requests.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ProxyError {
    /// Status code reported to the client
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Route(RouteError::MissingRouteKey { .. }) => StatusCode::BAD_REQUEST,
            ProxyError::Dispatch(DispatchError::UnknownRouteKey { .. }) => StatusCode::NOT_FOUND,
            ProxyError::Dispatch(DispatchError::InvalidTargetUrl { .. })
            | ProxyError::Dispatch(DispatchError::OutboundUri(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::Dispatch(DispatchError::Upstream(_)) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short plain-text body; details stay in the logs
    fn client_message(&self) -> &'static str {
        match self {
            ProxyError::Route(RouteError::MissingRouteKey { .. }) => "Missing routing header\n",
            ProxyError::Dispatch(DispatchError::UnknownRouteKey { .. }) => "Unknown route key\n",
            ProxyError::Dispatch(DispatchError::InvalidTargetUrl { .. }) => "Bad target URL\n",
            ProxyError::Dispatch(DispatchError::OutboundUri(_)) => "Internal Server Error\n",
            ProxyError::Dispatch(DispatchError::Upstream(_)) => "Bad Gateway\n",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = Response::new(AxumBody::from(self.client_message()));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
