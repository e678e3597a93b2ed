//! Pipeline statistics
//!
//! Shared atomic counters updated from the ingress task and the playback
//! driver thread. None of the drop conditions are fatal; the counters are
//! how they surface.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared counters for the sink pipeline
#[derive(Debug, Default)]
pub struct SinkStats {
    packets_received: AtomicU64,
    bytes_received: AtomicU64,
    frames_played: AtomicU64,
    silence_frames: AtomicU64,
    overruns: AtomicU64,
    underruns: AtomicU64,
    oversized_drops: AtomicU64,
    output_errors: AtomicU64,
    output_ring_drops: AtomicU64,
}

impl SinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_frame_played(&self) {
        self.frames_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_silence_frame(&self) {
        self.silence_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a rejected push (pool full). Returns the new total so callers
    /// can throttle logging.
    pub fn record_overrun(&self) -> u64 {
        self.overruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count an empty pop. Returns the new total so callers can throttle
    /// logging.
    pub fn record_underrun(&self) -> u64 {
        self.underruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a chunk dropped for exceeding the frame capacity.
    pub fn record_oversized_drop(&self) -> u64 {
        self.oversized_drops.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_output_error(&self) -> u64 {
        self.output_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a sample dropped because the output device ring was full.
    /// Returns the new total so callers can throttle logging.
    pub fn record_output_ring_drop(&self) -> u64 {
        self.output_ring_drops.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_played: self.frames_played.load(Ordering::Relaxed),
            silence_frames: self.silence_frames.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            oversized_drops: self.oversized_drops.load(Ordering::Relaxed),
            output_errors: self.output_errors.load(Ordering::Relaxed),
            output_ring_drops: self.output_ring_drops.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters; used when a new transport session begins.
    pub fn reset(&self) {
        self.packets_received.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.frames_played.store(0, Ordering::Relaxed);
        self.silence_frames.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
        self.oversized_drops.store(0, Ordering::Relaxed);
        self.output_errors.store(0, Ordering::Relaxed);
        self.output_ring_drops.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub frames_played: u64,
    pub silence_frames: u64,
    pub overruns: u64,
    pub underruns: u64,
    pub oversized_drops: u64,
    pub output_errors: u64,
    pub output_ring_drops: u64,
}

impl StatsSnapshot {
    /// Chunks dropped on the ingress side (full pool + oversized).
    pub fn frames_dropped(&self) -> u64 {
        self.overruns + self.oversized_drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = SinkStats::new();
        stats.record_packet(240);
        stats.record_packet(512);
        stats.record_frame_played();
        stats.record_silence_frame();
        assert_eq!(stats.record_overrun(), 1);
        assert_eq!(stats.record_overrun(), 2);
        assert_eq!(stats.record_oversized_drop(), 1);

        let snap = stats.snapshot();
        assert_eq!(snap.packets_received, 2);
        assert_eq!(snap.bytes_received, 752);
        assert_eq!(snap.frames_played, 1);
        assert_eq!(snap.silence_frames, 1);
        assert_eq!(snap.frames_dropped(), 3);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let stats = SinkStats::new();
        stats.record_packet(100);
        stats.record_underrun();
        stats.record_output_error();
        stats.record_output_ring_drop();

        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.packets_received, 0);
        assert_eq!(snap.bytes_received, 0);
        assert_eq!(snap.underruns, 0);
        assert_eq!(snap.output_errors, 0);
        assert_eq!(snap.output_ring_drops, 0);
    }

    #[test]
    fn test_output_ring_drops_counted_for_throttling() {
        let stats = SinkStats::new();
        assert_eq!(stats.record_output_ring_drop(), 1);
        assert_eq!(stats.record_output_ring_drop(), 2);
        assert_eq!(stats.snapshot().output_ring_drops, 2);
    }
}
