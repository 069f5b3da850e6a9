//! pane-viewer: entry point.
//!
//! ```text
//! pane-viewer                      Connect with pane-viewer.toml (or defaults)
//! pane-viewer --config <path>      Use custom config TOML
//! pane-viewer --gen-config <path>  Write default config to <path>
//! pane-viewer --host 10.0.0.5 --port 9998
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pane_core::ScreenClient;
use pane_viewer::config::ViewerConfig;
use pane_viewer::presenter::LogPresenter;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pane-viewer", about = "Pane delta-frame screen viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pane-viewer.toml")]
    config: PathBuf,

    /// Write the default configuration to PATH and exit.
    #[arg(long, value_name = "PATH")]
    gen_config: Option<PathBuf>,

    /// Server host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: write defaults and exit.
    if let Some(path) = &cli.gen_config {
        ViewerConfig::write_default(path)?;
        println!("wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("pane-viewer v{}", env!("CARGO_PKG_VERSION"));
    info!("connecting to {}", config.server_addr());

    let mut client = ScreenClient::connect(config.server_addr(), &config.to_client_config()).await?;
    let mut presenter =
        LogPresenter::new(config.report_interval()).with_stats(client.stats_receiver());

    // Ctrl-C handler.
    let quit = presenter.quit_handle();
    let stop = client.stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received; closing stream");
        quit.store(true, Ordering::SeqCst);
        stop.store(false, Ordering::SeqCst);
    });

    client.run(&mut presenter).await?;

    let stats = client.stats_receiver().borrow().clone();
    info!(
        "displayed {} frames ({} bytes received)",
        stats.total_frames, stats.total_bytes
    );
    Ok(())
}
