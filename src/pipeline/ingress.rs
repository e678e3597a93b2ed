//! Ingress adapter
//!
//! Feeds transport payload chunks into the frame pool. Chunks arrive at
//! network-driven, irregular times over an mpsc channel (the async rendition
//! of the transport's receive callback) and are forwarded unchanged: no
//! resampling, no decoding, only the frame-capacity length bound, which the
//! pool itself enforces. Drops are counted, never fatal.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, trace};

use crate::pipeline::pool::{FrameProducer, PushError};
use crate::state::TransportState;
use crate::stats::SinkStats;

/// Transport → frame pool adapter
pub struct IngressAdapter {
    producer: FrameProducer,
    state: Arc<TransportState>,
    stats: Arc<SinkStats>,
}

impl IngressAdapter {
    pub fn new(
        producer: FrameProducer,
        state: Arc<TransportState>,
        stats: Arc<SinkStats>,
    ) -> Self {
        Self {
            producer,
            state,
            stats,
        }
    }

    /// Forward one payload chunk to the pool.
    ///
    /// Chunks received while the transport is not connected are ignored
    /// (late deliveries straddling a disconnect). Push failures are already
    /// counted by the pool; the error is returned for observability only.
    pub fn handle_chunk(&mut self, chunk: &[u8]) -> Result<(), PushError> {
        if !self.state.is_connected() {
            trace!("Chunk of {} bytes ignored: transport not connected", chunk.len());
            return Ok(());
        }

        self.stats.record_packet(chunk.len());
        self.producer.push(chunk)
    }

    /// Consume chunks from the transport channel until it closes.
    pub async fn run(mut self, mut chunks: mpsc::Receiver<Vec<u8>>) {
        info!(
            "Ingress adapter started ({} slots x {} bytes)",
            self.producer.slots(),
            self.producer.frame_capacity()
        );

        while let Some(chunk) = chunks.recv().await {
            let _ = self.handle_chunk(&chunk);
        }

        info!("Transport channel closed, ingress adapter stopping");
    }
}
