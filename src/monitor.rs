//! Background monitoring tasks
//!
//! Periodic statistics reporting plus event housekeeping (counter reset
//! when a new transport session connects).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info};

use crate::events::{EventBus, SinkEvent};
use crate::state::TransportState;
use crate::stats::SinkStats;

/// Start background monitoring tasks.
pub fn start_monitoring(
    stats: Arc<SinkStats>,
    state: Arc<TransportState>,
    bus: EventBus,
    interval: Duration,
) {
    tokio::spawn(stats_report_task(
        Arc::clone(&stats),
        Arc::clone(&state),
        interval,
    ));

    // Subscribe before spawning so no event emitted after this call is missed
    let events = bus.subscribe();
    tokio::spawn(event_task(stats, events));
}

/// Log a stats line at a fixed interval while there is traffic.
async fn stats_report_task(
    stats: Arc<SinkStats>,
    state: Arc<TransportState>,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);

    info!("Stats report task started ({:?} interval)", interval);

    loop {
        ticker.tick().await;

        let snap = stats.snapshot();
        if snap.packets_received == 0 && snap.frames_played == 0 {
            continue;
        }

        info!(
            "stats: state={} packets={} data={:.1}KB played={} silence={} dropped={} underruns={} ring_drops={} output_errors={}",
            state.playback_state(),
            snap.packets_received,
            snap.bytes_received as f64 / 1024.0,
            snap.frames_played,
            snap.silence_frames,
            snap.frames_dropped(),
            snap.underruns,
            snap.output_ring_drops,
            snap.output_errors,
        );
    }
}

/// Watch the event bus: reset counters when a new session connects, and
/// debug-log everything else.
async fn event_task(stats: Arc<SinkStats>, mut events: broadcast::Receiver<SinkEvent>) {
    loop {
        match events.recv().await {
            Ok(SinkEvent::TransportConnected { .. }) => {
                stats.reset();
                debug!("Transport connected, stats reset");
            }
            Ok(other) => debug!("Event: {:?}", other),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Event subscriber lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
