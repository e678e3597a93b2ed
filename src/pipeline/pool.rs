//! Lock-free frame pool
//!
//! A small fixed ring of PCM frames decouples irregular transport arrival
//! from the steady playback cadence. Single producer (ingress task), single
//! consumer (playback driver thread); both sides operate without locks so
//! neither can stall the other.
//!
//! Overflow policy is reject-newest: when no slot is free, `push` fails
//! fast and the chunk is dropped (counted). The listener keeps the oldest
//! already-buffered audio instead of skipping ahead.

use std::sync::Arc;

use ringbuf::{traits::*, HeapRb};
use thiserror::Error;
use tracing::{trace, warn};

use crate::stats::SinkStats;

/// Log every Nth dropped chunk / empty pop to avoid spamming hot paths.
const DROP_LOG_INTERVAL: u64 = 1000;

/// One fixed-capacity unit of PCM payload moving through the pipeline.
///
/// Valid length ≤ the pool's frame capacity, enforced at push time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    fn copy_from(chunk: &[u8]) -> Self {
        Self {
            bytes: chunk.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Push failures. Both are expected under load and non-fatal: the chunk is
/// dropped and counted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// No free slot (reject-newest overflow policy)
    #[error("frame pool full, chunk dropped")]
    Overflow,

    /// Chunk longer than one frame slot
    #[error("chunk of {len} bytes exceeds frame capacity of {capacity}")]
    OversizedFrame { len: usize, capacity: usize },
}

/// Fixed ring of frame slots; split into producer and consumer halves.
pub struct FramePool {
    buffer: HeapRb<Frame>,
    frame_capacity: usize,
    stats: Arc<SinkStats>,
}

impl FramePool {
    /// Create a pool of `slots` frames, each holding up to `frame_capacity`
    /// bytes.
    pub fn new(slots: usize, frame_capacity: usize, stats: Arc<SinkStats>) -> Self {
        Self {
            buffer: HeapRb::new(slots),
            frame_capacity,
            stats,
        }
    }

    /// Split into producer and consumer halves. The producer goes to the
    /// ingress task, the consumer to the playback driver thread.
    pub fn split(self) -> (FrameProducer, FrameConsumer) {
        let (prod, cons) = self.buffer.split();

        let producer = FrameProducer {
            producer: prod,
            frame_capacity: self.frame_capacity,
            stats: Arc::clone(&self.stats),
        };

        let consumer = FrameConsumer {
            consumer: cons,
            stats: self.stats,
        };

        (producer, consumer)
    }
}

/// Producer half of the frame pool (ingress side)
pub struct FrameProducer {
    producer: ringbuf::HeapProd<Frame>,
    frame_capacity: usize,
    stats: Arc<SinkStats>,
}

impl FrameProducer {
    /// Copy a chunk into the next free slot.
    ///
    /// Fails with `OversizedFrame` when the chunk exceeds one slot, or
    /// `Overflow` when no slot is free; in both cases the pool is left
    /// unchanged. Lock-free, safe to call concurrently with `pop`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), PushError> {
        if chunk.len() > self.frame_capacity {
            let count = self.stats.record_oversized_drop();
            if count % DROP_LOG_INTERVAL == 1 {
                warn!(
                    "Dropped oversized chunk: {} bytes > {} capacity (total: {})",
                    chunk.len(),
                    self.frame_capacity,
                    count
                );
            }
            return Err(PushError::OversizedFrame {
                len: chunk.len(),
                capacity: self.frame_capacity,
            });
        }

        match self.producer.try_push(Frame::copy_from(chunk)) {
            Ok(()) => Ok(()),
            Err(_) => {
                let count = self.stats.record_overrun();
                if count % DROP_LOG_INTERVAL == 1 {
                    warn!("Frame pool full, chunk dropped (total: {})", count);
                }
                Err(PushError::Overflow)
            }
        }
    }

    /// Number of occupied slots.
    pub fn occupied_len(&self) -> usize {
        self.producer.occupied_len()
    }

    /// Total slot count.
    pub fn slots(&self) -> usize {
        self.producer.capacity().into()
    }

    /// Byte capacity of one frame slot.
    pub fn frame_capacity(&self) -> usize {
        self.frame_capacity
    }
}

/// Consumer half of the frame pool (playback side)
pub struct FrameConsumer {
    consumer: ringbuf::HeapCons<Frame>,
    stats: Arc<SinkStats>,
}

impl FrameConsumer {
    /// Take the oldest frame, or `None` immediately when the pool is empty.
    ///
    /// Never blocks: the caller has a hard real-time deadline and
    /// substitutes silence on `None`. Empty pops are counted as underruns.
    pub fn pop(&mut self) -> Option<Frame> {
        match self.consumer.try_pop() {
            Some(frame) => Some(frame),
            None => {
                let count = self.stats.record_underrun();
                if count % DROP_LOG_INTERVAL == 1 {
                    trace!("Frame pool empty on pop (total: {})", count);
                }
                None
            }
        }
    }

    /// Drop all buffered frames; used on stop/disconnect. Returns the
    /// number of frames discarded. The pool is immediately reusable.
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.consumer.try_pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    /// Number of occupied slots.
    pub fn occupied_len(&self) -> usize {
        self.consumer.occupied_len()
    }
}
