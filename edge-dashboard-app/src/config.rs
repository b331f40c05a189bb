//! Application configuration
//!
//! Read once at startup from a JSON file. Every key is optional; a missing
//! file means all defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use edge_dashboard_core::error::{CoreError, CoreResult};
use edge_dashboard_core::StoreOptions;

/// Where the edge sidecar listens by default
pub const DEFAULT_SIDECAR_URL: &str = "ws://127.0.0.1:9528";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// WebSocket URL of the edge sidecar
    pub sidecar_url: String,
    /// Per-request reply timeout
    pub request_timeout_ms: u64,
    /// Give up on unconfirmed installs after this many seconds (unset = never)
    pub install_timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sidecar_url: DEFAULT_SIDECAR_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            install_timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(CoreError::ConfigError(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| CoreError::ConfigError(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CoreResult<()> {
        if !(self.sidecar_url.starts_with("ws://") || self.sidecar_url.starts_with("wss://")) {
            return Err(CoreError::ConfigError(format!(
                "sidecarUrl must be a ws:// or wss:// URL, got '{}'",
                self.sidecar_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(CoreError::ConfigError(
                "requestTimeoutMs must be positive".to_string(),
            ));
        }
        if self.install_timeout_secs == Some(0) {
            return Err(CoreError::ConfigError(
                "installTimeoutSecs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn install_timeout(&self) -> Option<Duration> {
        self.install_timeout_secs.map(Duration::from_secs)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            install_timeout: self.install_timeout(),
        }
    }
}
