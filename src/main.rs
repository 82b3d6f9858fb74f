use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wpa_ctrl::UnixCtrlTransport;
use wpa_events::{SupplicantTransport, WpaEventMonitor};

mod printer;
mod replay;
mod settings;

use printer::EventPrinter;
use replay::ReplayTransport;
use settings::Settings;

#[derive(Parser)]
#[command(name = "wpa-monitor")]
#[command(about = "Watch wpa_supplicant control events and print them as they arrive")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to <config dir>/wpa-monitor/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach to the running supplicant
    Monitor {
        /// Interfaces to watch (e.g., wlan0)
        #[arg(required = true)]
        interfaces: Vec<String>,
        /// Print one JSON object per event
        #[arg(long)]
        json: bool,
    },
    /// Feed a captured event log through the parser
    Replay {
        file: PathBuf,
        /// Interface for lines without an IFNAME= prefix
        #[arg(long, default_value = "wlan0")]
        interface: String,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.verbose {
        settings.monitor.verbose = true;
    }

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    match cli.command {
        Commands::Monitor { interfaces, json } => monitor(settings, interfaces, json).await,
        Commands::Replay {
            file,
            interface,
            json,
        } => replay(settings, file, interface, json).await,
    }
}

async fn monitor(settings: Settings, interfaces: Vec<String>, json: bool) -> Result<()> {
    let transport = Arc::new(UnixCtrlTransport::new(settings.ctrl.clone()));
    let monitor = WpaEventMonitor::new(transport, settings.monitor.clone());

    let mut watched = interfaces;
    if !watched.contains(&settings.monitor.p2p_interface) {
        watched.push(settings.monitor.p2p_interface.clone());
    }
    for interface in &watched {
        EventPrinter::subscribe_all(&monitor, interface, json);
    }
    for interface in &watched {
        start(&monitor, interface).await?;
    }

    info!("Monitoring {} (Ctrl-C to stop)", watched.join(", "));
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Stopping");
    monitor.stop_all_monitoring();
    dump_event_log(&monitor);
    Ok(())
}

async fn replay(settings: Settings, file: PathBuf, interface: String, json: bool) -> Result<()> {
    let transport: Arc<dyn SupplicantTransport> = Arc::new(
        ReplayTransport::open(&file, &interface)
            .with_context(|| format!("Failed to open {}", file.display()))?,
    );
    let monitor = WpaEventMonitor::new(transport, settings.monitor);

    EventPrinter::subscribe_all(&monitor, &interface, json);
    start(&monitor, &interface).await?;

    let reader = monitor.clone();
    tokio::select! {
        joined = tokio::task::spawn_blocking(move || reader.join_reader()) => {
            joined.context("Reader join task failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Replay interrupted");
            monitor.stop_all_monitoring();
        }
    }

    dump_event_log(&monitor);
    Ok(())
}

/// `start_monitoring` sleeps between connect attempts, so keep it off the
/// runtime threads.
async fn start(monitor: &WpaEventMonitor, interface: &str) -> Result<()> {
    let monitor = monitor.clone();
    let name = interface.to_string();
    tokio::task::spawn_blocking(move || monitor.start_monitoring(&name))
        .await
        .context("Start task failed")?
        .with_context(|| format!("Failed to start monitoring {}", interface))
}

fn dump_event_log(monitor: &WpaEventMonitor) {
    for line in monitor.event_log() {
        debug!("{}", line);
    }
}
