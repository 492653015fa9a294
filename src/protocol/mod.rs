//! Stream socket protocol: binary media frames and JSON control messages

pub mod control;
pub mod wire;

pub use control::{decode_text, AudioDecoderConfig, DecoderConfigs, InboundMessage, VideoDecoderConfig};
pub use wire::{parse_frame, FrameRecord, FrameType};
