//! Output sink capability
//!
//! The pipeline never talks to hardware directly: the playback driver
//! writes fixed-cadence PCM blocks through this trait, and a
//! platform-specific collaborator owns device setup, sample format, and
//! recovery. [`CpalOutput`] is the host-playback implementation.

pub mod cpal_output;

pub use cpal_output::CpalOutput;

use crate::error::Result;

/// A peripheral that accepts PCM blocks at the playback cadence.
pub trait OutputSink {
    /// Write one block of 16-bit little-endian interleaved PCM.
    ///
    /// Called from the playback driver thread once per tick; must not
    /// block for longer than a fraction of the tick period. Returning an
    /// error reports a peripheral fault upward; the driver counts it and
    /// keeps ticking.
    fn write(&mut self, pcm: &[u8]) -> Result<()>;
}
