//! Configuration for the screen server.

use std::path::Path;
use std::time::Duration;

use pane_core::{Resolution, SessionConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Screen capture settings.
    pub screen: ScreenConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Per-message send deadline in milliseconds (0 = wait forever).
    pub send_timeout_ms: u64,
}

/// Screen capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Streamed width in pixels.
    pub width: u32,
    /// Streamed height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Longest a capture waits for a frame, in milliseconds.
    pub capture_timeout_ms: u64,
    /// Stamp the status badge onto every frame.
    pub overlay: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 9998,
            send_timeout_ms: 5000,
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            capture_timeout_ms: 100,
            overlay: true,
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

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
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

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.network.host, self.network.port)
    }

    /// Streamed resolution, with zero dimensions raised to 1.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.screen.width.max(1), self.screen.height.max(1))
    }

    /// Target fps clamped to 1..=120.
    pub fn fps(&self) -> u32 {
        self.screen.fps.clamp(1, 120)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.screen.capture_timeout_ms.max(1))
    }

    /// Convert into the per-session settings of the core server.
    pub fn to_server_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(self.resolution());
        config.send_timeout = match self.network.send_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        config
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("port"));
        assert!(text.contains("fps"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 9998);
        assert_eq!(parsed.screen.width, 1920);
        assert_eq!(parsed.screen.height, 1080);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: ServerConfig = toml::from_str("[screen]\nwidth = 800\n").unwrap();
        assert_eq!(parsed.screen.width, 800);
        assert_eq!(parsed.screen.height, 1080);
        assert_eq!(parsed.network.host, "0.0.0.0");
    }

    #[test]
    fn to_server_config_clamps() {
        let mut cfg = ServerConfig::default();
        cfg.screen.fps = 500;
        cfg.screen.width = 0;
        cfg.network.send_timeout_ms = 0;
        assert_eq!(cfg.fps(), 120);

        let session = cfg.to_server_config();
        assert_eq!(session.resolution, Resolution::new(1, 1080));
        assert_eq!(session.send_timeout, None);
    }

    #[test]
    fn written_default_loads_back() {
        let path = std::env::temp_dir().join(format!("pane-server-{}.toml", std::process::id()));
        ServerConfig::write_default(&path).unwrap();
        let cfg = ServerConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9998");
        assert_eq!(cfg.resolution(), Resolution::new(1920, 1080));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let cfg = ServerConfig::load(Path::new("/nonexistent/pane-server.toml"));
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9998");
    }
}
