//! Client configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for [`ApiClient`](crate::client::ApiClient).
///
/// # Example Configuration File
///
/// ```toml
/// base_url = "https://api.fintrack.example"
/// refresh_path = "/auth/refresh"
/// sign_in_path = "/login"
/// timeout_ms = 15000
/// queue_dir = "/var/lib/fintrack/offline-queue"
///
/// [headers]
/// "X-Client" = "fintrack-desktop"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API origin prefixed to every logical path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Session renewal endpoint.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Where the user is sent when the session cannot be renewed.
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,

    /// Statuses meaning "already applied" when replaying queued writes.
    #[serde(default = "default_conflict_statuses")]
    pub conflict_statuses: Vec<u16>,

    /// Transport timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Directory of the file-backed offline queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_dir: Option<PathBuf>,

    /// Extra headers sent on every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_sign_in_path() -> String {
    "/login".to_string()
}

fn default_conflict_statuses() -> Vec<u16> {
    vec![409]
}

fn default_timeout() -> u64 {
    30_000 // 30 seconds
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            refresh_path: default_refresh_path(),
            sign_in_path: default_sign_in_path(),
            conflict_statuses: default_conflict_statuses(),
            timeout_ms: default_timeout(),
            queue_dir: None,
            headers: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// - `FINTRACK_API_URL` - API origin
    /// - `FINTRACK_REFRESH_PATH` - renewal endpoint
    /// - `FINTRACK_SIGN_IN_PATH` - sign-in redirect target
    /// - `FINTRACK_TIMEOUT_MS` - transport timeout
    /// - `FINTRACK_QUEUE_DIR` - offline queue directory
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("FINTRACK_API_URL") {
            config.base_url = url;
        }
        if let Ok(path) = std::env::var("FINTRACK_REFRESH_PATH") {
            config.refresh_path = path;
        }
        if let Ok(path) = std::env::var("FINTRACK_SIGN_IN_PATH") {
            config.sign_in_path = path;
        }
        if let Some(ms) = std::env::var("FINTRACK_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout_ms = ms;
        }
        if let Ok(dir) = std::env::var("FINTRACK_QUEUE_DIR") {
            config.queue_dir = Some(PathBuf::from(dir));
        }

        config
    }

    /// Check that the base URL parses and the paths are absolute.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::configuration(format!("invalid base_url: {}", e)))?;
        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("sign_in_path", &self.sign_in_path),
        ] {
            if !path.starts_with('/') {
                return Err(Error::configuration(format!(
                    "{} must start with '/': {}",
                    name, path
                )));
            }
        }
        Ok(())
    }

    /// Transport timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether a replay status means the write was already applied.
    pub fn is_conflict(&self, status: u16) -> bool {
        self.conflict_statuses.contains(&status)
    }

    /// Directory of the file-backed queue, falling back to the platform data dir.
    pub fn resolved_queue_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.queue_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("fintrack").join("offline-queue"))
            .ok_or_else(|| Error::configuration("no platform data directory; set queue_dir"))
    }

    /// Set the API origin.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the renewal endpoint.
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Set the sign-in redirect target.
    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    /// Set the transport timeout.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the offline queue directory.
    pub fn with_queue_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.queue_dir = Some(dir.into());
        self
    }

    /// Add a header sent on every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
