//! ImgTrans sender entry point.
//!
//! Loads the TOML config, applies command-line overrides, opens the sender,
//! and streams a test pattern until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from()         -- file values, or defaults
//!  └─ open_sender()              -- bind TCP listener or UDP socket
//!  └─ spawn_blocking(run)        -- StreamFramesUseCase pump (blocking sockets)
//!  └─ ctrl_c                     -- clears `running`, pump exits at next step
//! ```
//!
//! The sockets are blocking std sockets, so the pump lives on a blocking
//! thread.  Tokio's only job is the Ctrl-C handler.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use imgtrans_core::{SystemInterfaceResolver, Transport};
use imgtrans_sender::application::stream_frames::StreamFramesUseCase;
use imgtrans_sender::infrastructure::source::{
    TestPatternSource, DEFAULT_PATTERN_HEIGHT, DEFAULT_PATTERN_WIDTH,
};
use imgtrans_sender::infrastructure::storage::config::{load_config_from, DEFAULT_CONFIG_FILE};
use imgtrans_sender::open_sender;

/// How long shutdown waits for a pump blocked in accept or discovery.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Stream JPEG frames to receivers over TCP or UDP.
#[derive(Debug, Parser)]
#[command(name = "imgtrans-sender", version, about)]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, env = "IMGTRANS_SENDER_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Transport: "tcp" or "udp".
    #[arg(long)]
    transport: Option<Transport>,

    /// Interface name or IPv4 address to bind.
    #[arg(long)]
    interface: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// TCP accept timeout in seconds.
    #[arg(long)]
    timeout: Option<f64>,

    /// UDP receiver to register without a handshake (repeatable).
    #[arg(long = "client")]
    clients: Vec<String>,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_PATTERN_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = DEFAULT_PATTERN_HEIGHT)]
    height: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(transport) = args.transport {
        config.transport = transport;
    }
    if let Some(interface) = args.interface {
        config.interface = interface;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.timeout.is_some() {
        config.timeout_secs = args.timeout;
    }
    config.clients.extend(args.clients);

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("ImgTrans sender starting");

    let sender = open_sender(&config, &SystemInterfaceResolver)?;
    let source = TestPatternSource::new(args.width, args.height);
    let mut use_case = StreamFramesUseCase::new(sender, Box::new(source), config.transport);

    // Shutdown flag.
    let running = Arc::new(AtomicBool::new(true));

    // ── Streaming pump ────────────────────────────────────────────────────────
    let pump_running = Arc::clone(&running);
    let frame_interval = config.frame_interval();
    let max_frames = args.frames;
    let mut pump = tokio::task::spawn_blocking(move || {
        use_case.run(&pump_running, frame_interval, max_frames)
    });

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let joined = tokio::select! {
        joined = &mut pump => joined,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Ctrl-C handler failed: {e}");
            }
            info!("shutdown signal received");
            running.store(false, Ordering::Relaxed);
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut pump).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("pump still blocked after {SHUTDOWN_GRACE:?}; exiting anyway");
                    return Ok(());
                }
            }
        }
    };

    match joined.context("streaming thread panicked")? {
        Ok(stats) => {
            info!(
                frames_sent = stats.frames_sent,
                reconnects = stats.reconnects,
                "ImgTrans sender stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!("streaming failed: {e}");
            Err(e.into())
        }
    }
}
