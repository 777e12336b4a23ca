use std::fmt;

use http::{
    Uri,
    uri::{Authority, Scheme},
};
use thiserror::Error;
use url::{Position, Url};

/// Reasons a configured target cannot be forwarded to
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TargetError {
    /// Not parseable as an absolute URL
    #[error("not an absolute URL: {0}")]
    Malformed(String),

    /// Parsed, but not something an HTTP client can talk to
    #[error("unsupported scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("invalid authority '{0}'")]
    InvalidAuthority(String),
}

/// A parsed backend base URL.
///
/// Targets are parsed once per published snapshot and then reused for every request that
/// resolves to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    raw: String,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    query: Option<String>,
}

impl Target {
    /// Parse a target, requiring an `http`/`https` URL with a host.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let url = Url::parse(raw).map_err(|e| TargetError::Malformed(e.to_string()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(TargetError::UnsupportedScheme(other.to_string())),
        };

        if url.host_str().is_none_or(str::is_empty) {
            return Err(TargetError::MissingHost);
        }

        // Host and port only; credentials in the target are not forwarded
        let authority_str = &url[Position::BeforeHost..Position::AfterPort];
        let authority = authority_str
            .parse::<Authority>()
            .map_err(|_| TargetError::InvalidAuthority(authority_str.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            scheme,
            authority,
            base_path: url.path().to_string(),
            query: url.query().map(str::to_string),
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// `scheme://authority`, as logged for each forwarded request
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Build the outbound URI for a request whose (rewritten) path is `path` and whose raw
    /// query string is `query`.
    ///
    /// The path is appended to the target's base path with exactly one slash at the seam.
    /// Query strings are concatenated with `&` when both sides are non-empty.
    pub fn outbound_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, http::Error> {
        let path = join_paths(&self.base_path, path);
        let target_query = self.query.as_deref().unwrap_or("");
        let request_query = query.unwrap_or("");
        let query = if target_query.is_empty() || request_query.is_empty() {
            format!("{target_query}{request_query}")
        } else {
            format!("{target_query}&{request_query}")
        };

        let path_and_query = if query.is_empty() {
            path
        } else {
            format!("{path}?{query}")
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}
