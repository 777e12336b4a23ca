use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};
use thiserror::Error;

use crate::config::models::{RoutingConfig, Settings};

/// Environment variable prefix for process settings (`TELEPATH_LISTEN_ADDR`, `TELEPATH_LOG__LEVEL`, ...)
pub const ENV_PREFIX: &str = "TELEPATH";

/// Failure to produce a [`RoutingConfig`] from the routing table file.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigLoadError {
    /// The file could not be read
    #[error("failed to read routing table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content is not JSON matching the routing table schema
    #[error("failed to parse routing table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read and parse the routing table at `path`.
///
/// Only the shape of the document is checked here. Unknown modes and malformed target URLs
/// are accepted so that one bad route cannot block a reload.
pub async fn load_routing_table(path: impl AsRef<Path>) -> Result<RoutingConfig, ConfigLoadError> {
    let path = path.as_ref();
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_routing_table(path, &data)
}

fn parse_routing_table(path: &Path, data: &[u8]) -> Result<RoutingConfig, ConfigLoadError> {
    serde_json::from_slice(data).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load process settings.
///
/// Sources, lowest precedence first: built-in defaults, the optional settings file (format
/// picked from its extension, TOML when unknown), then `TELEPATH_*` environment variables
/// with `__` separating nested keys.
pub fn load_settings(settings_path: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder();

    if let Some(path) = settings_path {
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };
        let path_str = path
            .to_str()
            .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?;
        builder = builder.add_source(File::new(path_str, format));
    }

    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .wrap_err("Failed to build settings")?;

    settings
        .try_deserialize()
        .wrap_err("Failed to deserialize settings")
}
