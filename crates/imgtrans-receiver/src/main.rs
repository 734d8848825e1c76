//! ImgTrans receiver entry point.
//!
//! Loads the TOML config, applies command-line overrides, connects to the
//! sender, and reads frames until Ctrl-C or the frame limit.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from()         -- file values, or defaults
//!  └─ open_receiver()            -- TCP connect or UDP bind + handshake
//!  └─ spawn_blocking(run)        -- ReceiveFramesUseCase pump; ends when the stream closes
//!  └─ ctrl_c                     -- clears `running`, pump exits after its read
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use imgtrans_core::{FramingMode, Transport};
use imgtrans_receiver::application::receive_frames::{DiscardSink, FrameSink, ReceiveFramesUseCase};
use imgtrans_receiver::infrastructure::storage::config::{load_config_from, DEFAULT_CONFIG_FILE};
use imgtrans_receiver::infrastructure::storage::DirectorySink;
use imgtrans_receiver::open_receiver;

/// How long shutdown waits for a pump blocked in a read.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Receive JPEG frames from an ImgTrans sender.
#[derive(Debug, Parser)]
#[command(name = "imgtrans-receiver", version, about)]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, env = "IMGTRANS_RECEIVER_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Transport: "tcp" or "udp".
    #[arg(long)]
    transport: Option<Transport>,

    /// Sender host name or IP.
    #[arg(long)]
    server: Option<String>,

    /// Sender port.
    #[arg(long)]
    port: Option<u16>,

    /// Local UDP port to bind.
    #[arg(long)]
    bind_port: Option<u16>,

    /// TCP framing: "marker" or "length_prefixed".
    #[arg(long)]
    framing: Option<FramingMode>,

    /// Directory to write received frames to.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(transport) = args.transport {
        config.transport = transport;
    }
    if let Some(server) = args.server {
        config.server_host = server;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind_port) = args.bind_port {
        config.bind_port = bind_port;
    }
    if let Some(framing) = args.framing {
        config.framing = framing;
    }
    if args.output_dir.is_some() {
        config.output_dir = args.output_dir;
    }

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("ImgTrans receiver starting");

    let sink: Box<dyn FrameSink> = match &config.output_dir {
        Some(dir) => Box::new(DirectorySink::create(dir)?),
        None => Box::new(DiscardSink),
    };
    let receiver = open_receiver(&config)?;
    let mut use_case = ReceiveFramesUseCase::new(receiver, sink);

    // Shutdown flag.
    let running = Arc::new(AtomicBool::new(true));

    // ── Receiving pump ────────────────────────────────────────────────────────
    let pump_running = Arc::clone(&running);
    let max_frames = args.frames;
    let mut pump =
        tokio::task::spawn_blocking(move || use_case.run(&pump_running, max_frames));

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
    let stats = joined.context("receiving thread panicked")?;

    info!(
        frames_received = stats.frames_received,
        timeouts = stats.timeouts,
        failures = stats.failures,
        "ImgTrans receiver stopped"
    );
    Ok(())
}
