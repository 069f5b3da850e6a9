//! pane-server: entry point.
//!
//! ```text
//! pane-server                      Serve with pane-server.toml (or defaults)
//! pane-server --config <path>      Load a custom config TOML
//! pane-server --gen-config <path>  Write default config to <path>
//! pane-server --port 9000 --width 1280 --height 720
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pane_core::ScreenServer;
use pane_server::config::ServerConfig;
use pane_server::source::SyntheticFactory;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pane-server", about = "Pane delta-frame screen server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pane-server.toml")]
    config: PathBuf,

    /// Write the default configuration to PATH and exit.
    #[arg(long, value_name = "PATH")]
    gen_config: Option<PathBuf>,

    /// Address to listen on (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Streamed width (overrides the config file).
    #[arg(long)]
    width: Option<u32>,

    /// Streamed height (overrides the config file).
    #[arg(long)]
    height: Option<u32>,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(width) = self.width {
            config.screen.width = width;
        }
        if let Some(height) = self.height {
            config.screen.height = height;
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: write defaults and exit.
    if let Some(path) = &cli.gen_config {
        ServerConfig::write_default(path)?;
        println!("wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    cli.apply(&mut config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("pane-server v{}", env!("CARGO_PKG_VERSION"));
    info!("resolution: {}", config.resolution());
    info!("target FPS: {}", config.fps());
    info!("overlay: {}", config.screen.overlay);

    let factory = SyntheticFactory {
        fps: config.fps(),
        capture_timeout: config.capture_timeout(),
        overlay: config.screen.overlay,
    };
    let server = ScreenServer::bind(config.bind_addr(), config.to_server_config(), factory).await?;
    let stop = server.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received; shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    server.run().await?;

    Ok(())
}
