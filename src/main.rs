//! wavesink - wireless audio sink entry point
//!
//! Wires the pipeline together: a transport feed (built-in test tone or raw
//! PCM on stdin) into the ingress adapter, the frame pool in the middle, and
//! the playback driver draining into a cpal device on its own thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::signal;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wavesink::config::{AudioConfig, TomlConfig};
use wavesink::control::{run_control, ControlCommand};
use wavesink::events::EventBus;
use wavesink::monitor::start_monitoring;
use wavesink::output::CpalOutput;
use wavesink::pipeline::{FramePool, IngressAdapter, PlaybackDriver};
use wavesink::state::TransportState;
use wavesink::stats::SinkStats;
use wavesink::tone::ToneGenerator;

/// Command-line arguments for wavesink
#[derive(Parser, Debug)]
#[command(name = "wavesink")]
#[command(about = "Wireless audio sink: buffered PCM playback")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "WAVESINK_CONFIG")]
    config: Option<PathBuf>,

    /// Audio output device name (default device if omitted)
    #[arg(short, long, env = "WAVESINK_DEVICE")]
    device: Option<String>,

    /// Initial volume 0-100 (overrides config)
    #[arg(short, long, env = "WAVESINK_VOLUME")]
    volume: Option<u8>,

    /// Play a built-in 440 Hz test tone instead of reading PCM from stdin
    #[arg(long)]
    tone: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("wavesink={}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting wavesink: {} Hz, {} ch, {}-byte frames x {} slots",
        config.audio.sample_rate,
        config.audio.channels,
        config.audio.frame_capacity,
        config.audio.pool_slots
    );

    let stats = Arc::new(SinkStats::new());
    let bus = EventBus::new(64);
    let volume = args.volume.unwrap_or(config.audio.default_volume);
    let state = Arc::new(TransportState::new(bus.clone(), volume));

    let pool = FramePool::new(
        config.audio.pool_slots,
        config.audio.frame_capacity,
        Arc::clone(&stats),
    );
    let (producer, consumer) = pool.split();

    // Playback driver on its own thread; the cpal stream is tied to the
    // thread that creates it, so the sink is built inside.
    let shutdown = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready_rx) = oneshot::channel();
    let driver_handle = {
        let state = Arc::clone(&state);
        let stats = Arc::clone(&stats);
        let shutdown = Arc::clone(&shutdown);
        let audio = config.audio.clone();
        let device = args.device.clone();

        std::thread::Builder::new()
            .name("playback-driver".to_string())
            .spawn(move || {
                let output = match CpalOutput::new(device, &audio, Arc::clone(&stats)) {
                    Ok(output) => {
                        let _ = ready_tx.send(Ok(()));
                        output
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                PlaybackDriver::new(
                    consumer,
                    state,
                    output,
                    stats,
                    audio.frame_capacity,
                    audio.tick_period(),
                )
                .run(shutdown);
            })
            .context("Failed to spawn playback driver thread")?
    };
    ready_rx
        .await
        .context("Playback driver thread exited during startup")?
        .context("Failed to open audio output")?;

    // Ingress: transport chunks arrive over this channel
    let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<u8>>(config.audio.pool_slots * 2);
    let ingress = IngressAdapter::new(producer, Arc::clone(&state), Arc::clone(&stats));
    tokio::spawn(ingress.run(chunk_rx));

    // Control commands
    let (control_tx, control_rx) = mpsc::channel(16);
    tokio::spawn(run_control(Arc::clone(&state), control_rx));

    start_monitoring(
        Arc::clone(&stats),
        Arc::clone(&state),
        bus.clone(),
        std::time::Duration::from_secs(config.stats_interval_secs),
    );

    state.set_connected(true);
    control_tx
        .send(ControlCommand::Play)
        .await
        .context("Control task exited during startup")?;

    let feeder = if args.tone {
        info!("Feeding built-in 440 Hz test tone");
        tokio::spawn(feed_tone(chunk_tx, config.audio.clone()))
    } else {
        info!("Feeding raw PCM from stdin");
        tokio::spawn(feed_stdin(chunk_tx, config.audio.clone()))
    };

    shutdown_signal().await;

    info!("Shutting down");
    feeder.abort();
    let _ = control_tx.send(ControlCommand::Stop).await;
    state.set_connected(false);

    // Give the driver a couple of ticks to observe Stopped and drain
    tokio::time::sleep(config.audio.tick_period() * 4).await;
    shutdown.store(true, Ordering::Relaxed);
    let _ = tokio::task::spawn_blocking(move || driver_handle.join()).await;

    info!("Shutdown complete");
    Ok(())
}

/// Generate tone chunks at the playback rate.
async fn feed_tone(chunks: mpsc::Sender<Vec<u8>>, audio: AudioConfig) {
    let mut tone = ToneGenerator::new(audio.sample_rate);
    let mut ticker = tokio::time::interval(audio.tick_period());

    loop {
        ticker.tick().await;
        let chunk = tone.next_chunk(audio.frame_capacity);
        if chunks.send(chunk).await.is_err() {
            break;
        }
    }
}

/// Read raw PCM from stdin, paced at the playback rate so a piped file
/// behaves like a live transport instead of flooding the pool.
async fn feed_stdin(chunks: mpsc::Sender<Vec<u8>>, audio: AudioConfig) {
    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; audio.frame_capacity];
    let mut ticker = tokio::time::interval(audio.tick_period());

    loop {
        ticker.tick().await;
        match stdin.read(&mut buf).await {
            Ok(0) => {
                info!("End of input stream");
                break;
            }
            Ok(n) => {
                if chunks.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to read input stream: {}", e);
                break;
            }
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
