//! Routing key extraction.
//!
//! [`route`] is a pure function of the request and the routing table: it never touches the
//! store and never mutates anything, so the same request against the same snapshot always
//! yields the same [`RouteDecision`].
use http::Request;
use thiserror::Error;

use crate::config::models::{RoutingConfig, RoutingMode};

/// Where a request should go, before the key is resolved to a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// Routing key (percent-decoded in path mode), compared verbatim against the table
    pub key: String,
    /// Path to forward, relative to the target's base path
    pub rewritten_path: String,
}

/// Errors produced while extracting a routing key
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    /// Header mode and the routing header is absent or empty
    #[error("missing routing header '{header}'")]
    MissingRouteKey { header: String },
}

/// Compute the routing key and forwarded path for `req` under `config`.
pub fn route<B>(req: &Request<B>, config: &RoutingConfig) -> Result<RouteDecision, RouteError> {
    let path = req.uri().path();

    match &config.mode {
        RoutingMode::Header => {
            // Lookup by &str is case-insensitive; an illegal header name simply never matches
            let key = req
                .headers()
                .get(config.header_name.as_str())
                .filter(|value| !value.is_empty())
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .ok_or_else(|| RouteError::MissingRouteKey {
                    header: config.header_name.clone(),
                })?;

            Ok(RouteDecision {
                key,
                rewritten_path: path.to_string(),
            })
        }
        RoutingMode::Path => Ok(split_first_segment(path)),
        RoutingMode::Other(_) => Ok(RouteDecision {
            key: String::new(),
            rewritten_path: path.to_string(),
        }),
    }
}

/// Split `/key/rest...` into the key and a cleaned `/rest...`.
///
/// All leading and trailing slashes are ignored when locating the key. The key is
/// percent-decoded; the remaining segments stay encoded and are joined without empty elements
/// and with `.`/`..` resolved lexically.
fn split_first_segment(path: &str) -> RouteDecision {
    let mut segments = path.trim_matches('/').split('/');
    let raw_key = segments.next().unwrap_or_default();
    let key =
        String::from_utf8_lossy(&urlencoding::decode_binary(raw_key.as_bytes())).into_owned();

    let mut cleaned: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(cleaned.last(), Some(last) if *last != "..") {
                    cleaned.pop();
                } else {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other),
        }
    }

    RouteDecision {
        key,
        rewritten_path: format!("/{}", cleaned.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn request(path: &str) -> Request<()> {
        Request::builder().uri(path).body(()).unwrap()
    }

    fn header_request(path: &str, name: &str, value: &str) -> Request<()> {
        Request::builder()
            .uri(path)
            .header(name, value)
            .body(())
            .unwrap()
    }

    fn path_config() -> RoutingConfig {
        RoutingConfig::builder()
            .path_mode()
            .route("api", "http://localhost:9000")
            .build()
    }

    #[test]
    fn test_path_mode_strips_first_segment() {
        let decision = route(&request("/api/foo"), &path_config()).unwrap();
        assert_eq!(decision.key, "api");
        assert_eq!(decision.rewritten_path, "/foo");

        let decision = route(&request("/billing/invoices/1"), &path_config()).unwrap();
        assert_eq!(decision.key, "billing");
        assert_eq!(decision.rewritten_path, "/invoices/1");
    }

    #[test]
    fn test_path_mode_single_segment_rewrites_to_root() {
        let decision = route(&request("/api"), &path_config()).unwrap();
        assert_eq!(decision.key, "api");
        assert_eq!(decision.rewritten_path, "/");

        let decision = route(&request("/api/"), &path_config()).unwrap();
        assert_eq!(decision.key, "api");
        assert_eq!(decision.rewritten_path, "/");
    }

    #[test]
    fn test_path_mode_root_yields_empty_key() {
        let decision = route(&request("/"), &path_config()).unwrap();
        assert_eq!(decision.key, "");
        assert_eq!(decision.rewritten_path, "/");
    }

    #[test]
    fn test_path_mode_cleans_remaining_segments() {
        let decision = route(&request("//api//a//b/"), &path_config()).unwrap();
        assert_eq!(decision.key, "api");
        assert_eq!(decision.rewritten_path, "/a/b");

        let decision = route(&request("/api/a/./b/../c"), &path_config()).unwrap();
        assert_eq!(decision.rewritten_path, "/a/c");

        let decision = route(&request("/api/a/.."), &path_config()).unwrap();
        assert_eq!(decision.rewritten_path, "/");
    }

    #[test]
    fn test_path_mode_keys_are_case_sensitive() {
        let decision = route(&request("/API/foo"), &path_config()).unwrap();
        assert_eq!(decision.key, "API");
    }

    #[test]
    fn test_path_mode_ignores_query() {
        let decision = route(&request("/api/foo?x=1"), &path_config()).unwrap();
        assert_eq!(decision.key, "api");
        assert_eq!(decision.rewritten_path, "/foo");
    }

    #[test]
    fn test_header_mode_reads_header_case_insensitively() {
        let config = RoutingConfig::builder()
            .header_mode("X-Env")
            .route("prod", "http://10.0.0.1:80")
            .build();

        let decision = route(&header_request("/a/b", "x-env", "prod"), &config).unwrap();
        assert_eq!(decision.key, "prod");
        assert_eq!(decision.rewritten_path, "/a/b");
    }

    #[test]
    fn test_header_mode_missing_or_empty_header() {
        let config = RoutingConfig::builder().header_mode("X-Env").build();

        assert_eq!(
            route(&request("/"), &config),
            Err(RouteError::MissingRouteKey {
                header: "X-Env".to_string()
            })
        );
        assert!(route(&header_request("/", "X-Env", ""), &config).is_err());
    }

    #[test]
    fn test_header_mode_with_illegal_header_name() {
        let config = RoutingConfig::builder().header_mode("").build();
        assert!(route(&header_request("/", "X-Env", "prod"), &config).is_err());
    }

    #[test]
    fn test_header_mode_accepts_non_ascii_values() {
        let config = RoutingConfig::builder()
            .header_mode("X-Env")
            .route("café", "http://10.0.0.1:80")
            .build();
        let req = Request::builder()
            .uri("/menu")
            .header("X-Env", HeaderValue::from_bytes("café".as_bytes()).unwrap())
            .body(())
            .unwrap();

        let decision = route(&req, &config).unwrap();
        assert_eq!(decision.key, "café");
        assert!(config.routes.contains_key(&decision.key));
    }

    #[test]
    fn test_path_mode_decodes_key_but_not_rest() {
        let decision = route(&request("/my%20svc/a%2Fb/c%20d"), &path_config()).unwrap();
        assert_eq!(decision.key, "my svc");
        assert_eq!(decision.rewritten_path, "/a%2Fb/c%20d");

        let decision = route(&request("/caf%C3%A9/x"), &path_config()).unwrap();
        assert_eq!(decision.key, "café");
    }

    #[test]
    fn test_unknown_mode_falls_back_to_empty_key() {
        let config = RoutingConfig::builder()
            .mode(RoutingMode::Other("cookie".to_string()))
            .build();
        let decision = route(&request("/api/foo"), &config).unwrap();
        assert_eq!(decision.key, "");
        assert_eq!(decision.rewritten_path, "/api/foo");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let config = path_config();
        let req = request("/api/x/y");
        let first = route(&req, &config).unwrap();
        for _ in 0..10 {
            assert_eq!(route(&req, &config).unwrap(), first);
        }
    }
}
