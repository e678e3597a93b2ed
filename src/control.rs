//! Control command surface
//!
//! Typed commands applied to the shared [`TransportState`]. Parsing the
//! transport's wire or serial command format is the sending collaborator's
//! job; by the time a command reaches this channel it is already typed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::TransportState;

/// Playback control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Start playback (from idle, stopped, or paused)
    Play,
    /// Pause playback; buffered frames are kept
    Pause,
    /// Resume from pause
    Resume,
    /// Stop playback and drop buffered frames
    Stop,
    /// Set volume, 0-100
    SetVolume(u8),
    /// Mute without losing the stored volume level
    Mute,
    /// Restore the stored volume level
    Unmute,
}

/// Apply commands from the control channel to the transport state.
///
/// Rejected transitions (e.g. Resume while stopped) are logged and dropped;
/// a misbehaving controller must not take the pipeline down.
pub async fn run_control(
    state: Arc<TransportState>,
    mut commands: mpsc::Receiver<ControlCommand>,
) {
    info!("Control task started");

    while let Some(command) = commands.recv().await {
        debug!("Control command: {:?}", command);
        if let Err(e) = state.apply(command) {
            warn!("Rejected control command {:?}: {}", command, e);
        }
    }

    info!("Control channel closed, control task stopping");
}
