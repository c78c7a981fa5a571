pub mod canned;
pub mod codec;
pub mod consumer;
pub mod fallback;

pub use codec::{decode_event, encode_event, encode_frame, Frame, FrameDecoder};
pub use consumer::{StreamConsumer, StreamHandle, StreamOutcome, StreamStatus, Transport};
pub use fallback::{FallbackProducer, FallbackSchedule, FallbackTiming, ScheduledEvent};
