//! Viewer configuration.

use std::path::Path;
use std::time::Duration;

use pane_core::ClientConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Display settings.
    pub display: DisplayConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connect + handshake timeout in milliseconds (0 = wait forever).
    pub connect_timeout_ms: u64,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Alpha written into every composed pixel.
    pub alpha: u8,
    /// Compositor worker threads (0 = one per core).
    pub workers: usize,
    /// Seconds between presenter reports.
    pub report_interval: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9998,
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            alpha: pane_core::DEFAULT_DISPLAY_ALPHA,
            workers: 0,
            report_interval: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// `host:port` of the server.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.network.host, self.network.port)
    }

    /// Presenter report interval, at least one second.
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.display.report_interval.max(1))
    }

    /// Convert into the core client settings.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            workers: self.display.workers,
            display_alpha: self.display.alpha,
            connect_timeout: match self.network.connect_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ViewerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("host"));
        assert!(text.contains("alpha"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ViewerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ViewerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server_addr(), "127.0.0.1:9998");
        assert_eq!(parsed.display.alpha, 0xFF);
    }

    #[test]
    fn to_client_config_maps_fields() {
        let mut cfg = ViewerConfig::default();
        cfg.display.alpha = 0x80;
        cfg.display.workers = 3;
        cfg.network.connect_timeout_ms = 0;
        cfg.display.report_interval = 0;

        let client = cfg.to_client_config();
        assert_eq!(client.display_alpha, 0x80);
        assert_eq!(client.workers, 3);
        assert_eq!(client.connect_timeout, None);
        assert_eq!(cfg.report_interval(), Duration::from_secs(1));
    }

    #[test]
    fn written_default_loads_back() {
        let path = std::env::temp_dir().join(format!("pane-viewer-{}.toml", std::process::id()));
        ViewerConfig::write_default(&path).unwrap();
        let cfg = ViewerConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.server_addr(), "127.0.0.1:9998");
        assert_eq!(cfg.display.alpha, 0xFF);
    }
}
