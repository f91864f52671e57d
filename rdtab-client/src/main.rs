//! rdtab session host — entry point.
//!
//! ```text
//! rdtab-client                    Connect with defaults
//! rdtab-client --config <path>   Use custom config TOML
//! rdtab-client --gen-config      Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use rdtab_core::{
    DisplayMetrics, Notice, NoticeSink, SessionController, SessionEvent,
};

use rdtab_client::config::ClientConfig;
use rdtab_client::sim::SimEngineFactory;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rdtab-client", about = "rdtab remote session host")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "rdtab-client.toml")]
    config: PathBuf,

    /// Remote address (overrides config). Example: 192.168.1.100
    #[arg(short, long)]
    address: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Notice sink ──────────────────────────────────────────────────

/// Routes deferred user notices to the log in place of a dialog box.
struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn present(&self, notice: &Notice) {
        warn!("[{}] {}", notice.title, notice.message);
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ClientConfig::load(&cli.config);
    if let Some(addr) = cli.address {
        config.connection.address = addr;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("rdtab-client v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Build the session ────────────────────────────────────

    let session_config = config.connection.to_session_config();
    let factory = Box::new(SimEngineFactory::new(config.simulator.clone()));
    let sink = Arc::new(LogNoticeSink);

    // No real window here, so no viewport metrics; desktop size falls
    // back to the profile's explicit width/height.
    let (controller, handle, mut events) =
        SessionController::new(session_config, DisplayMetrics::default(), factory, sink)?;
    let controller_task = tokio::spawn(controller.run());

    // ── 2. Connect and drain lifecycle events ───────────────────

    info!(
        "connecting to {} as {}",
        config.connection.address, config.connection.username
    );
    handle.connect();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::StatusChanged(status)) => info!("status: {status}"),
                Some(SessionEvent::FocusRequested) => debug!("focus requested"),
                Some(SessionEvent::Disconnected { reason }) => {
                    info!("disconnected (reason {reason})");
                }
                Some(SessionEvent::ConnectionClosed) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt; disconnecting");
                handle.disconnect();
            }
        }
    }

    // ── 3. Shutdown ─────────────────────────────────────────────

    info!("session closed; shutting down");
    drop(handle);
    controller_task.await?;

    Ok(())
}
