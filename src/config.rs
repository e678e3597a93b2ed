//! Configuration for wavesink
//!
//! Single-tier TOML bootstrap configuration: audio format, pool geometry,
//! default volume, stats reporting cadence, and logging. All fields have
//! built-in defaults so the sink runs without a config file at all; a file
//! only overrides what it names.
//!
//! The defaults describe the sink's reference hardware profile: 44.1 kHz
//! 16-bit stereo PCM, 512-byte frames, a 4-slot pool, volume 80/100.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Bootstrap configuration loaded from a TOML file
///
/// These settings cannot change during runtime. The process must restart
/// to pick up changes.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Audio format and buffer geometry
    #[serde(default)]
    pub audio: AudioConfig,

    /// Seconds between periodic statistics log lines
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Audio format and buffer geometry
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Channel count (1 = mono, 2 = stereo)
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Bits per sample (only 16-bit PCM is supported)
    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u16,

    /// Frame capacity in bytes (one pool slot)
    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,

    /// Number of slots in the frame pool
    #[serde(default = "default_pool_slots")]
    pub pool_slots: usize,

    /// Initial volume, 0-100
    #[serde(default = "default_volume")]
    pub default_volume: u8,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u16 {
    2
}

fn default_bits_per_sample() -> u16 {
    16
}

fn default_frame_capacity() -> usize {
    512
}

fn default_pool_slots() -> usize {
    4
}

fn default_volume() -> u8 {
    80
}

fn default_stats_interval_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            stats_interval_secs: default_stats_interval_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bits_per_sample: default_bits_per_sample(),
            frame_capacity: default_frame_capacity(),
            pool_slots: default_pool_slots(),
            default_volume: default_volume(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file, or built-in defaults when no
    /// path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text).map_err(|e| {
                    Error::Config(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.audio.validate()?;

        if self.stats_interval_secs == 0 {
            return Err(Error::Config(
                "stats_interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl AudioConfig {
    /// Bytes consumed by playback per second of wall time.
    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * (self.bits_per_sample as u64 / 8)
    }

    /// Bytes per interleaved sample frame (all channels of one sample).
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Playback tick period: the time one full frame lasts on the output.
    ///
    /// `frame_capacity / (sample_rate * channels * bytes_per_sample)`
    /// seconds; ~2.9 ms for the default 512-byte frames at 44.1 kHz stereo.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.frame_capacity as f64 / self.bytes_per_second() as f64)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be non-zero".to_string()));
        }

        if self.channels == 0 || self.channels > 2 {
            return Err(Error::Config(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }

        if self.bits_per_sample != 16 {
            return Err(Error::Config(format!(
                "only 16-bit PCM is supported, got {} bits per sample",
                self.bits_per_sample
            )));
        }

        if self.frame_capacity == 0 || self.frame_capacity % self.block_align() != 0 {
            return Err(Error::Config(format!(
                "frame_capacity must be a non-zero multiple of {} bytes",
                self.block_align()
            )));
        }

        if self.pool_slots == 0 {
            return Err(Error::Config("pool_slots must be at least 1".to_string()));
        }

        if self.default_volume > 100 {
            return Err(Error::Config(format!(
                "default_volume must be 0-100, got {}",
                self.default_volume
            )));
        }

        Ok(())
    }
}
