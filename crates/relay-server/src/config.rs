//! Server configuration.
//!
//! Loading flow mirrors the rest of the stack: compiled defaults, then an
//! optional JSON file, then environment variable overrides (highest
//! priority).

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Prefix prepended to the advertised message endpoint URL.
    ///
    /// Empty by default, so the handshake event carries a relative URL.
    pub base_url: String,
    /// Path serving the SSE event stream.
    pub sse_path: String,
    /// Path receiving JSON-RPC message submissions.
    pub message_path: String,
    /// Per-session outbound queue depth before sends are dropped.
    pub channel_capacity: usize,
    /// SSE keep-alive comment interval in seconds.
    pub keep_alive_secs: u64,
    /// Bounded wait for sessions to drain during graceful shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            base_url: String::new(),
            sse_path: "/sse".into(),
            message_path: "/message".into(),
            channel_capacity: 256,
            keep_alive_secs: 15,
            shutdown_timeout_secs: 5,
        }
    }
}

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file was not valid JSON for [`ServerConfig`].
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerConfig {
    /// Load configuration from a JSON file, falling back to defaults for
    /// absent fields (and entirely when the file does not exist), then
    /// apply environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            tracing::debug!(?path, "loading server config from file");
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            tracing::debug!(?path, "config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `RELAY_HOST` / `RELAY_PORT` environment overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("RELAY_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("RELAY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.port = port;
        }
    }
}
