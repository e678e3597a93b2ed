//! cpal-backed output sink
//!
//! Bridges the tick-driven playback driver to cpal's pull-model callback
//! with a small lock-free sample ring: `write` pushes samples, the device
//! callback pops them and substitutes silence when the ring runs dry. The
//! driver tick and the device clock run at the same nominal rate, so the
//! ring only has to absorb jitter between the two.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{traits::*, HeapRb};
use tracing::{debug, error, info, warn};

use crate::config::AudioConfig;
use crate::error::{Error, Result};
use crate::output::OutputSink;
use crate::stats::SinkStats;

/// Sample ring capacity in frames; absorbs driver/device clock jitter.
const RING_FRAMES: usize = 8;

/// Log every Nth dropped sample batch.
const DROP_LOG_INTERVAL: u64 = 1000;

/// Audio device sink using cpal
///
/// The stream is tied to the thread that created it, so build this inside
/// the playback driver thread.
pub struct CpalOutput {
    _stream: Stream,
    producer: ringbuf::HeapProd<i16>,
    error_flag: Arc<AtomicBool>,
    stats: Arc<SinkStats>,
    device_name: String,
}

impl CpalOutput {
    /// Open an output device and start its stream.
    ///
    /// Falls back to the default device when the requested name is not
    /// found. Prefers a native i16 stream at the configured rate and
    /// channel count, then f32, then whatever the device defaults to.
    pub fn new(
        device_name: Option<String>,
        config: &AudioConfig,
        stats: Arc<SinkStats>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name.as_ref() {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    Error::AudioOutput(format!("Failed to enumerate devices: {}", e))
                })?;

                match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!(
                            "Requested device '{}' not found, falling back to default device",
                            name
                        );
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host.default_output_device().ok_or_else(|| {
                Error::AudioOutput("No default output device found".to_string())
            })?,
        };

        let resolved_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (stream_config, sample_format) = Self::pick_config(&device, config)?;

        debug!(
            "Audio config: device={}, sample_rate={}, channels={}, format={:?}",
            resolved_name, stream_config.sample_rate.0, stream_config.channels, sample_format
        );
        if stream_config.sample_rate.0 != config.sample_rate {
            warn!(
                "Device runs at {} Hz, payload is {} Hz; playback speed will be off",
                stream_config.sample_rate.0, config.sample_rate
            );
        }

        let ring = HeapRb::<i16>::new((config.frame_capacity / 2).max(1) * RING_FRAMES);
        let (producer, consumer) = ring.split();

        let error_flag = Arc::new(AtomicBool::new(false));
        let stream = Self::build_stream(&device, &stream_config, sample_format, consumer, Arc::clone(&error_flag))?;

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!("Audio stream started on {}", resolved_name);

        Ok(Self {
            _stream: stream,
            producer,
            error_flag,
            stats,
            device_name: resolved_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Pick a stream configuration matching the payload format as closely
    /// as the device allows.
    fn pick_config(
        device: &Device,
        config: &AudioConfig,
    ) -> Result<(StreamConfig, SampleFormat)> {
        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .filter(|c| {
                c.channels() == config.channels
                    && c.min_sample_rate().0 <= config.sample_rate
                    && c.max_sample_rate().0 >= config.sample_rate
                    && matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32)
            })
            // Native i16 beats converting to f32
            .min_by_key(|c| match c.sample_format() {
                SampleFormat::I16 => 0,
                _ => 1,
            });

        if let Some(supported_config) = supported {
            let sample_format = supported_config.sample_format();
            let stream_config = supported_config
                .with_sample_rate(cpal::SampleRate(config.sample_rate))
                .config();
            return Ok((stream_config, sample_format));
        }

        // Fallback: whatever the device defaults to
        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        let sample_format = supported_config.sample_format();
        Ok((supported_config.config(), sample_format))
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        mut consumer: ringbuf::HeapCons<i16>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<Stream> {
        let err_cb = {
            let error_flag = Arc::clone(&error_flag);
            move |err: cpal::StreamError| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            }
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().unwrap_or(0);
                    }
                },
                err_cb,
                None,
            ),
            SampleFormat::F32 => device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = consumer
                            .try_pop()
                            .map(|s| s as f32 / 32768.0)
                            .unwrap_or(0.0);
                    }
                },
                err_cb,
                None,
            ),
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream.map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

impl OutputSink for CpalOutput {
    fn write(&mut self, pcm: &[u8]) -> Result<()> {
        if self.error_flag.swap(false, Ordering::SeqCst) {
            return Err(Error::AudioOutput(format!(
                "stream error on {}",
                self.device_name
            )));
        }

        for bytes in pcm.chunks_exact(2) {
            let sample = i16::from_le_bytes([bytes[0], bytes[1]]);
            if self.producer.try_push(sample).is_err() {
                // Ring full: the device clock is running slightly behind
                // the tick clock. Drop the rest of the block and let the
                // cadence re-converge.
                let count = self.stats.record_output_ring_drop();
                if count % DROP_LOG_INTERVAL == 1 {
                    warn!("Output ring full, block truncated (total: {})", count);
                }
                break;
            }
        }

        Ok(())
    }
}
