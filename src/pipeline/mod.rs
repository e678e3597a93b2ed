//! Audio buffering pipeline: ingress adapter → frame pool → playback driver

pub mod driver;
pub mod ingress;
pub mod pool;

pub use driver::{scale_volume, PlaybackDriver};
pub use ingress::IngressAdapter;
pub use pool::{Frame, FrameConsumer, FramePool, FrameProducer, PushError};
