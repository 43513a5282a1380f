//! Looper GW - MIDI foot controller to OSC looper gateway

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use looper_gw::config::{AppConfig, NoteSpec};
use looper_gw::gateway::Gateway;
use looper_gw::osc::OscLink;
use looper_gw::pedal::{discovery, PedalBoard};
use looper_gw::state::{GatewayActor, GatewayHandle};
use looper_gw::transport::LiveTransport;

const DEFAULT_CONFIG: &str = "looper-gw.yaml";

/// Looper GW - drive a looping engine from a MIDI foot controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "LOOPER_GW_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Pedal board MIDI input port (exact name or substring)
    #[arg(long)]
    din: Option<String>,

    /// Name of the virtual MIDI output port
    #[arg(long)]
    vout: Option<String>,

    /// Outbound MIDI channel (1-16)
    #[arg(long)]
    ch: Option<u8>,

    /// Base note, as a number or a note name like E3
    #[arg(long)]
    base: Option<String>,

    /// UDP port the engine replies to
    #[arg(long)]
    oin: Option<u16>,

    /// UDP port of the engine
    #[arg(long)]
    oout: Option<u16>,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Send all note offs and panic CCs to the virtual output, then exit
    #[arg(long)]
    panic: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.list_ports {
        discovery::print_ports();
        return Ok(());
    }

    let config = load_config(&args).await?;

    if args.panic {
        return send_panic(&config);
    }

    info!("Starting Looper GW v{}...", env!("CARGO_PKG_VERSION"));
    run_gateway(config).await?;
    info!("Looper GW shutdown complete");
    Ok(())
}

async fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path).await?,
        None => AppConfig::load_or_default(Path::new(DEFAULT_CONFIG)).await?,
    };

    if let Some(din) = &args.din {
        config.midi.input_port = Some(din.clone());
    }
    if let Some(vout) = &args.vout {
        config.midi.virtual_output = vout.clone();
    }
    if let Some(ch) = args.ch {
        config.midi.channel = ch;
    }
    if let Some(base) = &args.base {
        config.midi.base_note = match base.parse::<i64>() {
            Ok(n) => NoteSpec::Number(n),
            Err(_) => NoteSpec::Name(base.clone()),
        };
    }
    if let Some(oin) = args.oin {
        config.osc.receive_port = oin;
    }
    if let Some(oout) = args.oout {
        config.osc.send_port = oout;
    }

    config.validate().context("Invalid command line options")?;
    Ok(config)
}

async fn run_gateway(config: AppConfig) -> Result<()> {
    let (handle, events) = GatewayHandle::channel();
    let tick = Duration::from_millis(config.session.tick_ms);

    let transport = LiveTransport::new(
        OscLink::new(handle.clone()),
        PedalBoard::new(&config.midi, handle.clone()),
    );
    let gateway = Gateway::new(config, transport)?;

    // MIDI connections are not Send on every backend, so the actor runs here
    let actor = GatewayActor::new(gateway, events, tick).run();
    tokio::pin!(actor);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tokio::select! {
        _ = &mut actor => {
            warn!("Gateway actor exited unexpectedly");
            return Ok(());
        }
        _ = &mut shutdown => {}
    }

    handle.shutdown();
    actor.await;
    Ok(())
}

fn send_panic(config: &AppConfig) -> Result<()> {
    let (handle, _events) = GatewayHandle::channel();
    let mut pedals = PedalBoard::new(&config.midi, handle);
    pedals.poll();
    pedals
        .send_panic()
        .context("Failed to send panic messages")?;
    info!("Panic sent on all 16 channels");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
