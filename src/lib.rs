//! # wavesink
//!
//! Wireless audio sink pipeline: PCM chunks arrive from a transport at
//! irregular, network-driven times and are drained at a steady hardware
//! cadence into an output peripheral.
//!
//! **Architecture:** ingress adapter → fixed frame pool → playback driver,
//! gated by a shared transport state (play/pause/stop, volume). The pool is
//! a lock-free single-producer single-consumer ring so neither side ever
//! blocks the other; the playback side masks missing data with silence
//! rather than stalling.
//!
//! The transport itself (who delivers the chunks) and the output peripheral
//! (who eats the PCM) are external collaborators behind channel and trait
//! seams; a cpal-backed sink is provided for host playback.

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod monitor;
pub mod output;
pub mod pipeline;
pub mod state;
pub mod stats;
pub mod tone;

pub use error::{Error, Result};
pub use state::{PlaybackState, TransportState};
