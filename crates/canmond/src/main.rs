//! canmond - CAN diagnostic bridge daemon
//!
//! Listens for 0x762 responses on a CAN interface, keeps the most recent
//! ones in memory and serves them over HTTP. The diagnostic request
//! sequence on 0x742 is sent either per `POST /send` or free-running.
//!
//! # Usage
//!
//! ```bash
//! # Mock bus with simulated ECU replies
//! canmond
//!
//! # Real interface
//! canmond --interface can0
//!
//! # Config file
//! canmond config/canmon.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use canmon_api::{create_router, AppState};
use canmon_core::config::{BridgeConfig, MockConfig, SocketCanConfig, TransportConfig};
use canmon_core::{
    create_transport, DiagnosticSequencer, MessageStore, ReceiveLoop, SequencerMode, Shutdown,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long background tasks get to finish after the server stops
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "canmond")]
#[command(about = "CAN diagnostic bridge with HTTP monitor")]
struct Args {
    /// Configuration file path (TOML format)
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long, env = "CANMON_LISTEN")]
    listen: Option<SocketAddr>,

    /// CAN interface; selects the SocketCAN transport
    #[arg(short, long, conflicts_with = "mock")]
    interface: Option<String>,

    /// Use the in-memory bus with simulated ECU replies
    #[arg(long)]
    mock: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose {
        "canmond=debug,canmon_core=debug,canmon_api=debug,tower_http=debug"
    } else {
        "canmond=info,canmon_core=info,canmon_api=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting canmond (CAN diagnostic bridge)");

    let config = load_config(&args)?;

    let bus = create_transport(&config.transport)?;
    info!(
        interface = bus.interface(),
        policy = %config.filter.policy,
        capacity = config.history.capacity,
        mode = ?config.sequencer.mode,
        "Bus transceiver ready"
    );

    let store = Arc::new(MessageStore::new(config.history.capacity()?));
    let shutdown = Shutdown::new();

    let receive_handle = ReceiveLoop::new(bus.clone(), store.clone(), config.filter.policy)
        .with_timeout(config.receive.timeout())
        .spawn(shutdown.signal());

    let sequencer = Arc::new(
        DiagnosticSequencer::new(bus.clone()).with_timing(
            config.sequencer.transmit_timeout(),
            config.sequencer.frame_delay(),
        ),
    );

    // Exactly one sender per bus: the HTTP action or the free-running task
    let (on_demand, periodic_handle) = match config.sequencer.mode {
        SequencerMode::OnDemand => (Some(sequencer), None),
        SequencerMode::FreeRunning => {
            let handle =
                sequencer.spawn_periodic(config.sequencer.cycle_pause(), shutdown.signal());
            (None, Some(handle))
        }
    };

    let state = AppState::new(store, on_demand, config.filter.policy);
    let app = create_router(state);

    let addr = config.server.listen;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_ctrl_c())
        .await?;

    shutdown.trigger();
    match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, receive_handle).await {
        Ok(Ok(stats)) => info!(stored = stats.stored, errors = stats.errors, "Receive loop joined"),
        Ok(Err(e)) => warn!(error = %e, "Receive loop panicked"),
        Err(_) => warn!("Receive loop did not stop in time"),
    }
    if let Some(handle) = periodic_handle {
        match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, handle).await {
            Ok(Ok(passes)) => info!(passes, "Free-running sequencer joined"),
            Ok(Err(e)) => warn!(error = %e, "Free-running sequencer panicked"),
            Err(_) => warn!("Free-running sequencer did not stop in time"),
        }
    }

    info!("canmond stopped");
    Ok(())
}

/// Config file (or defaults) with command-line overrides applied
fn load_config(args: &Args) -> anyhow::Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            BridgeConfig::load(path)?
        }
        None => {
            info!("No config file provided, using defaults");
            BridgeConfig::default()
        }
    };

    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(interface) = &args.interface {
        config.transport = TransportConfig::SocketCan(SocketCanConfig {
            interface: interface.clone(),
            ..Default::default()
        });
    }
    if args.mock {
        config.transport = TransportConfig::Mock(MockConfig {
            latency_ms: 0,
            simulate_responses: true,
        });
    }

    config.validate()?;
    Ok(config)
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
