//! Buffering, pacing and output routing of per-stream media

pub mod buffer;
pub mod pacing;
pub mod router;

pub use buffer::{JitterBuffer, JitterBufferStats};
pub use pacing::{target_speed, Pacer, PacingState, PacingTask, PacingTick, SpeedStep};
pub use router::{deinterleave, AudioPort, ChannelRouter, DecodedAudio, RouteOutcome};
