//! loopthru entrypoint
//!
//! Pairs a MIDI output device to the chosen input, wires the session
//! controller into the input callback, and runs until ctrl-c.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::info;

use loopthru::config::AppConfig;
use loopthru::filter::MuteRange;
use loopthru::midi::event_line_header;
use loopthru::ports;
use loopthru::session::{SessionController, SessionSettings};
use loopthru::sink::{ConsoleSink, MidirOutputSink, OutputSink};

/// MIDI thru gateway with range muting and loop recording
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Log outgoing events instead of opening an output device
    #[arg(long)]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.list_ports {
        ports::print_ports()?;
        return Ok(());
    }

    let config = AppConfig::load_or_default(&args.config)?;
    let settings = SessionSettings {
        output_channel: config.midi.output_channel,
        trigger_key: config.looper.trigger_key,
        mute: MuteRange::new(config.looper.mute_low, config.looper.mute_high),
    };

    // resolve both devices before opening anything: a missing output must
    // not leave a half-open session
    let input_name = ports::resolve_input(&config.midi.input_port)
        .context("no usable MIDI input device")?;
    info!("input device: '{}'", input_name);

    let sink: Arc<dyn OutputSink> = if args.console {
        info!("console mode: events are logged, not transmitted");
        Arc::new(ConsoleSink)
    } else {
        let (conn, output_name) = ports::open_output(&config.midi.output_port, &input_name)
            .context("no usable MIDI output device")?;
        info!(
            "output device: '{}', remapping to channel {}",
            output_name, settings.output_channel
        );
        Arc::new(MidirOutputSink::new(conn))
    };

    let controller = Arc::new(Mutex::new(SessionController::new(
        settings,
        sink,
        Handle::current(),
    )));

    let handler = Arc::clone(&controller);
    let (_input_conn, _) = ports::open_input(&input_name, move |raw, at_ms| {
        handler.lock().on_event(raw, at_ms);
    })
    .context("failed to open MIDI input")?;

    info!(
        "ready: trigger key {} cycles record/play/stop, keys {}..={} muted",
        settings.trigger_key, settings.mute.low, settings.mute.high
    );
    info!("{}", event_line_header());

    tokio::signal::ctrl_c()
        .await
        .context("failed to install ctrl-c handler")?;
    info!("shutdown signal received");

    // cancel and join any live playback before the output sink goes away
    let playback = controller.lock().take_playback();
    if let Some(playback) = playback {
        playback.stop().await;
    }

    info!("loopthru shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}
