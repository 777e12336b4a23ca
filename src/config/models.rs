//! Configuration data structures for Telepath.
//!
//! Two documents are modelled here:
//! * [`RoutingConfig`]: the hot-reloadable routing table (`telepath.json`), shared with
//!   `telepathctl`.
//! * [`Settings`]: process settings (listen address, file locations, logging) that are read
//!   once at startup.
//!
//! Both are serde-friendly and default every field so that minimal files stay concise.
use std::{collections::HashMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Conventional location of the routing table.
pub const DEFAULT_ROUTES_PATH: &str = "./telepath.json";

/// Conventional listen address (all interfaces, port 8080).
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Key-extraction strategy for incoming requests.
///
/// Values other than `"header"` and `"path"` are kept verbatim in [`RoutingMode::Other`]
/// rather than rejected; requests then resolve to the empty routing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoutingMode {
    /// Key is the value of the configured request header.
    Header,
    /// Key is the first path segment, which is stripped before forwarding.
    Path,
    /// Any unrecognized (or missing) mode.
    Other(String),
}

impl Default for RoutingMode {
    fn default() -> Self {
        RoutingMode::Other(String::new())
    }
}

impl From<String> for RoutingMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "header" => RoutingMode::Header,
            "path" => RoutingMode::Path,
            _ => RoutingMode::Other(value),
        }
    }
}

impl From<RoutingMode> for String {
    fn from(mode: RoutingMode) -> Self {
        match mode {
            RoutingMode::Header => "header".to_string(),
            RoutingMode::Path => "path".to_string(),
            RoutingMode::Other(raw) => raw,
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMode::Header => f.write_str("header"),
            RoutingMode::Path => f.write_str("path"),
            RoutingMode::Other(raw) => write!(f, "{raw:?}"),
        }
    }
}

/// The routing table.
///
/// Route keys are compared exactly as extracted from the request; no case folding or
/// trimming is applied. Target URLs are stored as raw strings and only parsed when a
/// snapshot is published.
///
/// Parsing is lenient in the same ways as the tools that write the file: field names match
/// case-insensitively (an exact match wins), and a missing or `null` field takes its empty
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RoutingDocument")]
pub struct RoutingConfig {
    pub mode: RoutingMode,
    pub header_name: String,
    pub routes: HashMap<String, String>,
}

/// Raw JSON object a [`RoutingConfig`] is read from.
#[derive(Deserialize)]
#[serde(transparent)]
struct RoutingDocument(Map<String, Value>);

impl TryFrom<RoutingDocument> for RoutingConfig {
    type Error = serde_json::Error;

    fn try_from(RoutingDocument(mut fields): RoutingDocument) -> Result<Self, Self::Error> {
        let mode: Option<String> = take_field(&mut fields, "mode")?;
        let header_name: Option<String> = take_field(&mut fields, "headerName")?;
        let routes: Option<HashMap<String, Option<String>>> = take_field(&mut fields, "routes")?;

        Ok(RoutingConfig {
            mode: mode.map(RoutingMode::from).unwrap_or_default(),
            header_name: header_name.unwrap_or_default(),
            routes: routes
                .unwrap_or_default()
                .into_iter()
                .map(|(key, target)| (key, target.unwrap_or_default()))
                .collect(),
        })
    }
}

/// Remove and decode `name`, falling back to a case-insensitive match. `null` reads as absent.
fn take_field<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    name: &str,
) -> Result<Option<T>, serde_json::Error> {
    let key = if fields.contains_key(name) {
        Some(name.to_string())
    } else {
        fields
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    };

    match key.and_then(|key| fields.remove(&key)) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some),
    }
}

impl RoutingConfig {
    /// Create a new routing config builder
    pub fn builder() -> RoutingConfigBuilder {
        RoutingConfigBuilder::default()
    }
}

/// Builder for [`RoutingConfig`], mostly useful in tests and when embedding.
#[derive(Debug, Default)]
pub struct RoutingConfigBuilder {
    mode: RoutingMode,
    header_name: String,
    routes: HashMap<String, String>,
}

impl RoutingConfigBuilder {
    /// Route on the value of `header_name`.
    pub fn header_mode(mut self, header_name: impl Into<String>) -> Self {
        self.mode = RoutingMode::Header;
        self.header_name = header_name.into();
        self
    }

    /// Route on the first path segment.
    pub fn path_mode(mut self) -> Self {
        self.mode = RoutingMode::Path;
        self
    }

    /// Set an arbitrary mode value.
    pub fn mode(mut self, mode: RoutingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a route from `key` to `target`, replacing any previous target for that key.
    pub fn route(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.routes.insert(key.into(), target.into());
        self
    }

    pub fn build(self) -> RoutingConfig {
        RoutingConfig {
            mode: self.mode,
            header_name: self.header_name,
            routes: self.routes,
        }
    }
}

/// Output format for log records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive; `RUST_LOG` takes precedence when set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Process settings for the `telepath` server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the proxy listens on
    pub listen_addr: String,
    /// Location of the routing table, read at startup and on every reload
    pub routes_path: PathBuf,
    /// Also reload when the routing table file changes on disk
    pub watch_routes_file: bool,
    /// Where to record the server PID for `telepathctl refresh`
    pub pid_file: Option<PathBuf>,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            routes_path: PathBuf::from(DEFAULT_ROUTES_PATH),
            watch_routes_file: false,
            pid_file: None,
            log: LogSettings::default(),
        }
    }
}
