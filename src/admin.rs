//! Routing table editing and reload signalling for `telepathctl`.
//!
//! Edits go through a generic JSON document so fields this crate does not know about survive a
//! rewrite. Every write lands in a sibling temp file first and is renamed over the table, so a
//! reload racing an edit sees either the old or the new file, never a partial one.
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr, eyre};
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::core::target::{Target, TargetError};

/// Process name `refresh` signals when no PID file is given
pub const SERVER_PROCESS_NAME: &str = "telepath";

/// A routing table file opened for editing.
#[derive(Debug, Clone)]
pub struct RoutesFile {
    path: PathBuf,
}

impl RoutesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All routes as `(key, target)` pairs, sorted by key.
    pub async fn list(&self) -> Result<Vec<(String, String)>> {
        let document = self.read_document().await?;
        let mut routes: Vec<(String, String)> = match document.get(&routes_key(&document)) {
            Some(Value::Object(routes)) => routes
                .iter()
                .map(|(key, target)| (key.clone(), target_text(target)))
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(eyre!("\"routes\" in {} is not an object", self.display())),
        };
        routes.sort();
        Ok(routes)
    }

    /// Insert or replace a route.
    ///
    /// The route is written even if the target cannot be forwarded to; the parse error is
    /// returned so the caller can warn about it.
    pub async fn add(&self, key: &str, target: &str) -> Result<Option<TargetError>> {
        let mut document = self.read_document().await?;
        self.routes_mut(&mut document)?
            .insert(key.to_string(), Value::String(target.to_string()));
        self.write_document(&document).await?;
        Ok(Target::parse(target).err())
    }

    /// Remove a route. Returns whether the key was present; an absent key leaves the file
    /// untouched.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut document = self.read_document().await?;
        let removed = self.routes_mut(&mut document)?.remove(key).is_some();
        if removed {
            self.write_document(&document).await?;
        }
        Ok(removed)
    }

    async fn read_document(&self) -> Result<Map<String, Value>> {
        let raw = tokio::fs::read(&self.path)
            .await
            .wrap_err_with(|| format!("Failed to read routing table {}", self.display()))?;
        match serde_json::from_slice(&raw)
            .wrap_err_with(|| format!("Failed to parse routing table {}", self.display()))?
        {
            Value::Object(document) => Ok(document),
            _ => Err(eyre!("Routing table {} is not a JSON object", self.display())),
        }
    }

    fn routes_mut<'a>(
        &self,
        document: &'a mut Map<String, Value>,
    ) -> Result<&'a mut Map<String, Value>> {
        let key = routes_key(document);
        let routes = document
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if routes.is_null() {
            *routes = Value::Object(Map::new());
        }
        routes
            .as_object_mut()
            .ok_or_else(|| eyre!("\"routes\" in {} is not an object", self.display()))
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        let mut contents = serde_json::to_vec_pretty(document)?;
        contents.push(b'\n');

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| eyre!("Invalid routing table path {}", self.display()))?;
        let mut temp_name = file_name.to_os_string();
        temp_name.push(format!(".{}.tmp", std::process::id()));
        let temp_path = self.path.with_file_name(temp_name);

        tokio::fs::write(&temp_path, &contents)
            .await
            .wrap_err_with(|| format!("Failed to write {}", temp_path.display()))?;
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e)
                .wrap_err_with(|| format!("Failed to replace routing table {}", self.display()));
        }
        Ok(())
    }

    fn display(&self) -> std::path::Display<'_> {
        self.path.display()
    }
}

/// Key of the routes object, matched the way the server reads it: exact name first, then
/// case-insensitively.
fn routes_key(document: &Map<String, Value>) -> String {
    if document.contains_key("routes") {
        return "routes".to_string();
    }
    document
        .keys()
        .find(|key| key.eq_ignore_ascii_case("routes"))
        .cloned()
        .unwrap_or_else(|| "routes".to_string())
}

fn target_text(target: &Value) -> String {
    match target {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ask a running server to reload its routing table by sending it `SIGHUP`.
///
/// With a PID file the signal goes to that process only; otherwise to every process named
/// exactly `telepath`.
pub async fn send_reload_signal(pid_file: Option<&Path>) -> Result<()> {
    let mut command = match pid_file {
        Some(pid_file) => {
            let pid = read_pid_file(pid_file).await?;
            let mut command = Command::new("kill");
            command.arg("-HUP").arg(pid.to_string());
            command
        }
        None => {
            let mut command = Command::new("pkill");
            command.arg("-HUP").arg("-x").arg(SERVER_PROCESS_NAME);
            command
        }
    };

    let status = command
        .status()
        .await
        .wrap_err("Failed to run signal command")?;
    if !status.success() {
        return Err(match pid_file {
            Some(pid_file) => eyre!(
                "No server answered SIGHUP (pid file {})",
                pid_file.display()
            ),
            None => eyre!("No running '{}' process found", SERVER_PROCESS_NAME),
        });
    }
    Ok(())
}

async fn read_pid_file(pid_file: &Path) -> Result<u32> {
    let raw = tokio::fs::read_to_string(pid_file)
        .await
        .wrap_err_with(|| format!("Failed to read pid file {}", pid_file.display()))?;
    raw.trim()
        .parse()
        .wrap_err_with(|| format!("Pid file {} does not hold a process id", pid_file.display()))
}
