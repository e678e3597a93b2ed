//! Event system for wavesink
//!
//! One-to-many broadcasting over `tokio::broadcast`. Producers on hot paths
//! use `emit_lossy` so a slow or absent subscriber never blocks the audio
//! pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::state::PlaybackState;

/// Sink event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SinkEvent {
    /// Playback state changed
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// Volume or mute changed
    VolumeChanged {
        volume: u8,
        muted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Transport connected
    TransportConnected { timestamp: DateTime<Utc> },

    /// Transport disconnected
    TransportDisconnected { timestamp: DateTime<Utc> },

    /// Frame pool drained on stop/disconnect
    BufferCleared {
        frames_dropped: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for sink events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SinkEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Subscribe to events. Each subscriber gets every event emitted after
    /// the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<SinkEvent> {
        self.sender.subscribe()
    }

    /// Emit an event, returning the subscriber count or an error when there
    /// are no subscribers.
    pub fn emit(
        &self,
        event: SinkEvent,
    ) -> Result<usize, broadcast::error::SendError<SinkEvent>> {
        self.sender.send(event)
    }

    /// Emit an event, ignoring the no-subscribers case. Used on paths that
    /// must never fail or block.
    pub fn emit_lossy(&self, event: SinkEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
