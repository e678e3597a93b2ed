//! Playback driver
//!
//! Drains the frame pool at the output cadence and writes PCM to the output
//! sink. Runs on a dedicated thread, off the async runtime: each tick has a
//! hard deadline, and a missed tick is an audible glitch.
//!
//! Per tick:
//! - `Playing`: pop a frame, apply volume, write it. An empty pool is masked
//!   by writing a silence frame instead; the device never starves.
//! - `Paused` / `Idle`: nothing is popped or written; buffered frames keep.
//! - `Stopped`: drain the pool, then settle the shared state to Idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::output::OutputSink;
use crate::pipeline::pool::FrameConsumer;
use crate::state::{PlaybackState, TransportState};
use crate::stats::SinkStats;

/// Log every Nth output error to avoid spamming at tick rate.
const ERROR_LOG_INTERVAL: u64 = 1000;

/// Scale 16-bit little-endian PCM by an integer volume in [0, 100].
///
/// Each sample becomes `sample * volume / 100` using i32 arithmetic with
/// truncation toward zero. Volume 100 (or above) is a bit-exact
/// pass-through. A trailing odd byte is left untouched.
pub fn scale_volume(pcm: &mut [u8], volume: u8) {
    if volume >= 100 {
        return;
    }

    for sample in pcm.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]);
        let scaled = ((value as i32 * volume as i32) / 100) as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}

/// Frame pool → output sink adapter
pub struct PlaybackDriver<O: OutputSink> {
    consumer: FrameConsumer,
    state: Arc<TransportState>,
    output: O,
    stats: Arc<SinkStats>,
    silence: Vec<u8>,
    tick_period: Duration,
}

impl<O: OutputSink> PlaybackDriver<O> {
    pub fn new(
        consumer: FrameConsumer,
        state: Arc<TransportState>,
        output: O,
        stats: Arc<SinkStats>,
        frame_capacity: usize,
        tick_period: Duration,
    ) -> Self {
        Self {
            consumer,
            state,
            output,
            stats,
            silence: vec![0u8; frame_capacity],
            tick_period,
        }
    }

    /// One clock tick of the playback side.
    pub fn tick(&mut self) {
        match self.state.playback_state() {
            PlaybackState::Playing => match self.consumer.pop() {
                Some(frame) => {
                    let mut pcm = frame.into_bytes();
                    scale_volume(&mut pcm, self.state.effective_volume());
                    if Self::write_block(&mut self.output, &self.stats, &pcm) {
                        self.stats.record_frame_played();
                    }
                }
                None => {
                    // Underrun masking: feed silence so the device keeps
                    // its cadence instead of glitching.
                    if Self::write_block(&mut self.output, &self.stats, &self.silence) {
                        self.stats.record_silence_frame();
                    }
                }
            },

            PlaybackState::Paused | PlaybackState::Idle => {}

            PlaybackState::Stopped => {
                let dropped = self.consumer.clear();
                if dropped > 0 {
                    debug!("Dropped {} buffered frames on stop", dropped);
                }
                self.state.settle_idle(dropped);
            }
        }
    }

    /// Tick until shutdown is flagged, pacing against absolute deadlines so
    /// the cadence does not drift with per-tick jitter.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!(
            "Playback driver started ({} byte frames every {:?})",
            self.silence.len(),
            self.tick_period
        );

        let mut next_tick = Instant::now() + self.tick_period;
        while !shutdown.load(Ordering::Relaxed) {
            self.tick();

            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                // Fell behind (scheduling hiccup); resync rather than
                // bursting ticks to catch up.
                next_tick = now;
            }
            next_tick += self.tick_period;
        }

        info!("Playback driver stopped");
    }

    fn write_block(output: &mut O, stats: &SinkStats, pcm: &[u8]) -> bool {
        match output.write(pcm) {
            Ok(()) => true,
            Err(e) => {
                let count = stats.record_output_error();
                if count % ERROR_LOG_INTERVAL == 1 {
                    warn!("Output sink write failed (total: {}): {}", count, e);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlCommand;
    use crate::error::Result;
    use crate::events::EventBus;
    use crate::pipeline::pool::{FramePool, FrameProducer};
    use std::sync::Mutex;

    /// Records every block the driver writes.
    #[derive(Clone, Default)]
    struct CaptureSink {
        blocks: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl CaptureSink {
        fn blocks(&self) -> Vec<Vec<u8>> {
            self.blocks.lock().unwrap().clone()
        }
    }

    impl OutputSink for CaptureSink {
        fn write(&mut self, pcm: &[u8]) -> Result<()> {
            self.blocks.lock().unwrap().push(pcm.to_vec());
            Ok(())
        }
    }

    const FRAME_CAPACITY: usize = 8;

    fn setup(
        volume: u8,
    ) -> (
        FrameProducer,
        PlaybackDriver<CaptureSink>,
        CaptureSink,
        Arc<TransportState>,
        Arc<SinkStats>,
    ) {
        let stats = Arc::new(SinkStats::new());
        let state = Arc::new(TransportState::new(EventBus::new(16), volume));
        let sink = CaptureSink::default();
        let (producer, consumer) =
            FramePool::new(4, FRAME_CAPACITY, Arc::clone(&stats)).split();
        let driver = PlaybackDriver::new(
            consumer,
            Arc::clone(&state),
            sink.clone(),
            Arc::clone(&stats),
            FRAME_CAPACITY,
            Duration::from_millis(1),
        );
        (producer, driver, sink, state, stats)
    }

    #[test]
    fn test_scale_volume_full_is_passthrough() {
        let original = [0x34, 0x12, 0xFF, 0xFF, 0x00, 0x80];
        let mut pcm = original;
        scale_volume(&mut pcm, 100);
        assert_eq!(pcm, original);
    }

    #[test]
    fn test_scale_volume_half_truncates_toward_zero() {
        // 0x7FFF = 32767 -> 16383 = 0x3FFF
        let mut pcm = 0x7FFFi16.to_le_bytes().to_vec();
        scale_volume(&mut pcm, 50);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0x3FFF);

        // All-0xFF bytes are samples of -1; -1 * 50 / 100 truncates to 0
        let mut pcm = vec![0xFF; 4];
        scale_volume(&mut pcm, 50);
        assert_eq!(pcm, vec![0x00; 4]);

        // Negative sample: -1000 * 50 / 100 = -500
        let mut pcm = (-1000i16).to_le_bytes().to_vec();
        scale_volume(&mut pcm, 50);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), -500);
    }

    #[test]
    fn test_scale_volume_zero_silences() {
        let mut pcm = vec![0x12, 0x34, 0x56, 0x78];
        scale_volume(&mut pcm, 0);
        assert_eq!(pcm, vec![0x00; 4]);
    }

    #[test]
    fn test_scale_volume_trailing_odd_byte_untouched() {
        let mut pcm = vec![0xFF, 0xFF, 0xAB];
        scale_volume(&mut pcm, 50);
        assert_eq!(pcm[2], 0xAB);
    }

    #[test]
    fn test_playing_tick_writes_frames_in_order() {
        let (mut producer, mut driver, sink, state, _stats) = setup(100);
        state.apply(ControlCommand::Play).unwrap();

        producer.push(&[1, 0, 1, 0]).unwrap();
        producer.push(&[2, 0, 2, 0]).unwrap();

        driver.tick();
        driver.tick();

        assert_eq!(sink.blocks(), vec![vec![1, 0, 1, 0], vec![2, 0, 2, 0]]);
    }

    #[test]
    fn test_empty_pool_masked_with_silence() {
        let (_producer, mut driver, sink, state, stats) = setup(100);
        state.apply(ControlCommand::Play).unwrap();

        driver.tick();

        let blocks = sink.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], vec![0u8; FRAME_CAPACITY]);
        assert_eq!(stats.snapshot().silence_frames, 1);
        assert_eq!(stats.snapshot().frames_played, 0);
    }

    #[test]
    fn test_volume_applied_on_playback() {
        let (mut producer, mut driver, sink, state, _stats) = setup(50);
        state.apply(ControlCommand::Play).unwrap();

        producer.push(&0x7FFFi16.to_le_bytes()).unwrap();
        driver.tick();

        let blocks = sink.blocks();
        assert_eq!(i16::from_le_bytes([blocks[0][0], blocks[0][1]]), 0x3FFF);
    }

    #[test]
    fn test_mute_silences_without_losing_volume() {
        let (mut producer, mut driver, sink, state, _stats) = setup(100);
        state.apply(ControlCommand::Play).unwrap();
        state.apply(ControlCommand::Mute).unwrap();

        producer.push(&0x7FFFi16.to_le_bytes()).unwrap();
        driver.tick();

        assert_eq!(sink.blocks()[0], vec![0x00, 0x00]);
        assert_eq!(state.volume(), 100);
    }

    #[test]
    fn test_paused_suppresses_writes_keeps_pool() {
        let (mut producer, mut driver, sink, state, _stats) = setup(100);
        state.apply(ControlCommand::Play).unwrap();
        producer.push(&[1, 0]).unwrap();
        producer.push(&[2, 0]).unwrap();

        state.apply(ControlCommand::Pause).unwrap();
        driver.tick();
        driver.tick();
        assert!(sink.blocks().is_empty());
        assert_eq!(producer.occupied_len(), 2);

        // Resume plays the preserved frames
        state.apply(ControlCommand::Resume).unwrap();
        driver.tick();
        assert_eq!(sink.blocks(), vec![vec![1, 0]]);
    }

    #[test]
    fn test_stopped_clears_pool_and_settles_idle() {
        let (mut producer, mut driver, sink, state, _stats) = setup(100);
        state.apply(ControlCommand::Play).unwrap();
        producer.push(&[1, 0]).unwrap();
        producer.push(&[2, 0]).unwrap();

        state.apply(ControlCommand::Stop).unwrap();
        driver.tick();

        assert!(sink.blocks().is_empty());
        assert_eq!(producer.occupied_len(), 0);
        assert_eq!(state.playback_state(), PlaybackState::Idle);

        // Idle ticks stay silent on the wire
        driver.tick();
        assert!(sink.blocks().is_empty());
    }

    #[test]
    fn test_output_error_counted_not_fatal() {
        struct FailingSink;
        impl OutputSink for FailingSink {
            fn write(&mut self, _pcm: &[u8]) -> Result<()> {
                Err(crate::error::Error::AudioOutput("device gone".to_string()))
            }
        }

        let stats = Arc::new(SinkStats::new());
        let state = Arc::new(TransportState::new(EventBus::new(16), 100));
        let (mut producer, consumer) =
            FramePool::new(4, FRAME_CAPACITY, Arc::clone(&stats)).split();
        let mut driver = PlaybackDriver::new(
            consumer,
            Arc::clone(&state),
            FailingSink,
            Arc::clone(&stats),
            FRAME_CAPACITY,
            Duration::from_millis(1),
        );

        state.apply(ControlCommand::Play).unwrap();
        producer.push(&[1, 0]).unwrap();
        driver.tick();
        driver.tick(); // silence write also fails

        let snap = stats.snapshot();
        assert_eq!(snap.output_errors, 2);
        assert_eq!(snap.frames_played, 0);
    }
}
