//! Transport state shared between the ingress and playback adapters
//!
//! One explicitly owned object replaces ambient globals: playback state,
//! volume, mute, and connection flag. Both adapters read it lock-free on
//! every tick/chunk; mutation happens only through typed control commands
//! (applied by the control task) and connection lifecycle calls.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::control::ControlCommand;
use crate::error::{Error, Result};
use crate::events::{EventBus, SinkEvent};

/// Maximum volume level
pub const VOLUME_MAX: u8 = 100;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing to do; the driver neither pops nor writes
    Idle,
    /// Draining the pool at the output cadence
    Playing,
    /// Pops and writes suppressed; buffered frames kept
    Paused,
    /// Transient: the driver drains the pool, then settles to Idle
    Stopped,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
        }
    }
}

impl PlaybackState {
    fn as_u8(self) -> u8 {
        match self {
            PlaybackState::Idle => 0,
            PlaybackState::Playing => 1,
            PlaybackState::Paused => 2,
            PlaybackState::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            3 => PlaybackState::Stopped,
            _ => PlaybackState::Idle,
        }
    }
}

/// Shared transport state
///
/// All fields are atomics: the playback driver reads state and volume on
/// every tick from its real-time thread, so reads must never take a lock.
#[derive(Debug)]
pub struct TransportState {
    state: AtomicU8,
    volume: AtomicU8,
    muted: AtomicBool,
    connected: AtomicBool,
    bus: EventBus,
}

impl TransportState {
    /// Create transport state in Idle at the given initial volume (clamped
    /// to 0-100).
    pub fn new(bus: EventBus, volume: u8) -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Idle.as_u8()),
            volume: AtomicU8::new(volume.min(VOLUME_MAX)),
            muted: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            bus,
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Stored volume level, 0-100 (unaffected by mute).
    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Acquire)
    }

    /// Volume the playback driver actually applies: 0 while muted.
    pub fn effective_volume(&self) -> u8 {
        if self.is_muted() {
            0
        } else {
            self.volume()
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Update the transport connection flag.
    ///
    /// Disconnecting forces Stopped so the playback driver drains the pool;
    /// stale audio from a previous session must never play into a new one.
    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::AcqRel);
        if was == connected {
            return;
        }

        if connected {
            info!("Transport connected");
            self.bus.emit_lossy(SinkEvent::TransportConnected {
                timestamp: Utc::now(),
            });
        } else {
            info!("Transport disconnected");
            self.bus.emit_lossy(SinkEvent::TransportDisconnected {
                timestamp: Utc::now(),
            });

            let state = self.playback_state();
            if state != PlaybackState::Idle && state != PlaybackState::Stopped {
                self.set_state(PlaybackState::Stopped);
            }
        }
    }

    /// Apply a control command.
    ///
    /// Repeated commands in the already-current state are no-ops; genuinely
    /// invalid transitions return `Error::InvalidState`.
    pub fn apply(&self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::Play => {
                match self.playback_state() {
                    PlaybackState::Playing => {}
                    PlaybackState::Idle | PlaybackState::Stopped | PlaybackState::Paused => {
                        self.set_state(PlaybackState::Playing);
                    }
                }
                Ok(())
            }

            ControlCommand::Pause => match self.playback_state() {
                PlaybackState::Paused => Ok(()),
                PlaybackState::Playing => {
                    self.set_state(PlaybackState::Paused);
                    Ok(())
                }
                other => Err(Error::InvalidState(format!(
                    "cannot pause while {}",
                    other
                ))),
            },

            ControlCommand::Resume => match self.playback_state() {
                PlaybackState::Playing => Ok(()),
                PlaybackState::Paused => {
                    self.set_state(PlaybackState::Playing);
                    Ok(())
                }
                other => Err(Error::InvalidState(format!(
                    "cannot resume while {}",
                    other
                ))),
            },

            ControlCommand::Stop => {
                match self.playback_state() {
                    PlaybackState::Idle | PlaybackState::Stopped => {}
                    _ => self.set_state(PlaybackState::Stopped),
                }
                Ok(())
            }

            ControlCommand::SetVolume(level) => {
                let clamped = level.min(VOLUME_MAX);
                if clamped != level {
                    warn!("Volume {} out of range, clamped to {}", level, clamped);
                }
                self.volume.store(clamped, Ordering::Release);
                debug!("Volume set to {}", clamped);
                self.emit_volume_changed();
                Ok(())
            }

            ControlCommand::Mute => {
                if !self.muted.swap(true, Ordering::AcqRel) {
                    debug!("Muted");
                    self.emit_volume_changed();
                }
                Ok(())
            }

            ControlCommand::Unmute => {
                if self.muted.swap(false, Ordering::AcqRel) {
                    debug!("Unmuted");
                    self.emit_volume_changed();
                }
                Ok(())
            }
        }
    }

    /// Complete a stop: Stopped → Idle once the driver has drained the pool.
    ///
    /// Called only by the playback driver. A concurrent Play command wins:
    /// the compare-exchange fails and the state stays as the command set it.
    /// `BufferCleared` is only broadcast when frames were actually dropped;
    /// stopping with an empty pool is not a clear.
    pub(crate) fn settle_idle(&self, frames_dropped: usize) {
        if frames_dropped > 0 {
            self.bus.emit_lossy(SinkEvent::BufferCleared {
                frames_dropped,
                timestamp: Utc::now(),
            });
        }

        let stopped = PlaybackState::Stopped.as_u8();
        let idle = PlaybackState::Idle.as_u8();
        if self
            .state
            .compare_exchange(stopped, idle, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!("Playback state: stopped -> idle");
            self.bus.emit_lossy(SinkEvent::PlaybackStateChanged {
                old_state: PlaybackState::Stopped,
                new_state: PlaybackState::Idle,
                timestamp: Utc::now(),
            });
        }
    }

    fn set_state(&self, new_state: PlaybackState) {
        let old = PlaybackState::from_u8(
            self.state.swap(new_state.as_u8(), Ordering::AcqRel),
        );
        if old == new_state {
            return;
        }

        info!("Playback state: {} -> {}", old, new_state);
        self.bus.emit_lossy(SinkEvent::PlaybackStateChanged {
            old_state: old,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn emit_volume_changed(&self) {
        self.bus.emit_lossy(SinkEvent::VolumeChanged {
            volume: self.volume(),
            muted: self.is_muted(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(volume: u8) -> TransportState {
        TransportState::new(EventBus::new(16), volume)
    }

    #[test]
    fn test_initial_state() {
        let state = state_at(80);
        assert_eq!(state.playback_state(), PlaybackState::Idle);
        assert_eq!(state.volume(), 80);
        assert!(!state.is_muted());
        assert!(!state.is_connected());
    }

    #[test]
    fn test_volume_clamped_at_construction() {
        let state = state_at(200);
        assert_eq!(state.volume(), 100);
    }

    #[test]
    fn test_play_pause_resume_stop_cycle() {
        let state = state_at(80);

        state.apply(ControlCommand::Play).unwrap();
        assert_eq!(state.playback_state(), PlaybackState::Playing);

        state.apply(ControlCommand::Pause).unwrap();
        assert_eq!(state.playback_state(), PlaybackState::Paused);

        state.apply(ControlCommand::Resume).unwrap();
        assert_eq!(state.playback_state(), PlaybackState::Playing);

        state.apply(ControlCommand::Stop).unwrap();
        assert_eq!(state.playback_state(), PlaybackState::Stopped);

        state.settle_idle(0);
        assert_eq!(state.playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let state = state_at(80);

        // Pause and resume require an active session
        assert!(state.apply(ControlCommand::Pause).is_err());
        assert!(state.apply(ControlCommand::Resume).is_err());
        assert_eq!(state.playback_state(), PlaybackState::Idle);

        state.apply(ControlCommand::Play).unwrap();
        state.apply(ControlCommand::Stop).unwrap();
        assert!(state.apply(ControlCommand::Resume).is_err());
    }

    #[test]
    fn test_repeated_commands_are_noops() {
        let state = state_at(80);
        state.apply(ControlCommand::Stop).unwrap();
        assert_eq!(state.playback_state(), PlaybackState::Idle);

        state.apply(ControlCommand::Play).unwrap();
        state.apply(ControlCommand::Play).unwrap();
        assert_eq!(state.playback_state(), PlaybackState::Playing);
    }

    #[test]
    fn test_set_volume_clamps() {
        let state = state_at(80);
        state.apply(ControlCommand::SetVolume(50)).unwrap();
        assert_eq!(state.volume(), 50);

        state.apply(ControlCommand::SetVolume(255)).unwrap();
        assert_eq!(state.volume(), 100);
    }

    #[test]
    fn test_mute_preserves_volume() {
        let state = state_at(80);
        state.apply(ControlCommand::Mute).unwrap();
        assert_eq!(state.volume(), 80);
        assert_eq!(state.effective_volume(), 0);

        state.apply(ControlCommand::Unmute).unwrap();
        assert_eq!(state.effective_volume(), 80);
    }

    #[test]
    fn test_disconnect_forces_stop() {
        let state = state_at(80);
        state.set_connected(true);
        state.apply(ControlCommand::Play).unwrap();

        state.set_connected(false);
        assert_eq!(state.playback_state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_disconnect_while_idle_stays_idle() {
        let state = state_at(80);
        state.set_connected(true);
        state.set_connected(false);
        assert_eq!(state.playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn test_settle_idle_yields_to_new_play() {
        let state = state_at(80);
        state.apply(ControlCommand::Play).unwrap();
        state.apply(ControlCommand::Stop).unwrap();

        // A Play arriving before the driver settles wins
        state.apply(ControlCommand::Play).unwrap();
        state.settle_idle(2);
        assert_eq!(state.playback_state(), PlaybackState::Playing);
    }

    #[test]
    fn test_settle_with_empty_pool_emits_no_clear_event() {
        let bus = EventBus::new(16);
        let state = TransportState::new(bus.clone(), 80);
        state.apply(ControlCommand::Play).unwrap();
        state.apply(ControlCommand::Stop).unwrap();

        // Subscribe after Stop so only settle events are observed
        let mut rx = bus.subscribe();
        state.settle_idle(0);

        match rx.try_recv().unwrap() {
            SinkEvent::PlaybackStateChanged { new_state, .. } => {
                assert_eq!(new_state, PlaybackState::Idle);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_settle_with_dropped_frames_emits_clear_event() {
        let bus = EventBus::new(16);
        let state = TransportState::new(bus.clone(), 80);
        state.apply(ControlCommand::Play).unwrap();
        state.apply(ControlCommand::Stop).unwrap();

        let mut rx = bus.subscribe();
        state.settle_idle(3);

        match rx.try_recv().unwrap() {
            SinkEvent::BufferCleared { frames_dropped, .. } => {
                assert_eq!(frames_dropped, 3);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_state_change_emits_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let state = TransportState::new(bus, 80);

        state.apply(ControlCommand::Play).unwrap();

        match rx.try_recv().unwrap() {
            SinkEvent::PlaybackStateChanged {
                old_state,
                new_state,
                ..
            } => {
                assert_eq!(old_state, PlaybackState::Idle);
                assert_eq!(new_state, PlaybackState::Playing);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }
}
