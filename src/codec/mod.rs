//! Decoder capabilities and per-stream decoder lifecycle
//!
//! A [`CodecSession`] is one platform codec instance. [`DecoderHandle`] wraps a
//! session with the observable `unconfigured → configured → closed` state and
//! pushes decoded output and asynchronous errors onto a result channel.
//! [`DecoderSet`] owns the video/audio pair for one stream.

pub mod decoder;
pub mod handle;
pub mod video;

use bytes::Bytes;
use serde::Serialize;

use crate::error::CodecError;
use crate::protocol::{AudioDecoderConfig, VideoDecoderConfig};

pub use decoder::OpusDecoder;
pub use handle::{DecoderEvent, DecoderEventBody, DecoderHandle, DecoderOrigin, DecoderSet, Recovery};
pub use video::AnnexBPassthrough;

/// Media type handled by a buffer, pacer or decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderState {
    Unconfigured,
    Configured,
    Closed,
}

impl DecoderState {
    pub fn as_str(self) -> &'static str {
        match self {
            DecoderState::Unconfigured => "unconfigured",
            DecoderState::Configured => "configured",
            DecoderState::Closed => "closed",
        }
    }
}

/// Configuration handed to a codec session
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderConfig {
    Video(VideoDecoderConfig),
    Audio(AudioDecoderConfig),
}

/// Whether a chunk can be decoded on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Key,
    Delta,
}

/// Encoded unit fed to a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub chunk_type: ChunkType,
    /// Presentation timestamp in microseconds
    pub timestamp_us: u64,
    pub data: Bytes,
}

/// Video frame produced by a decoder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFrame {
    pub timestamp_us: u64,
    pub key_frame: bool,
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coded_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coded_height: Option<u32>,
    #[serde(skip)]
    pub data: Bytes,
}

/// Interleaved PCM produced by an audio decoder
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub timestamp_us: u64,
    pub sample_rate: u32,
    pub number_of_channels: u16,
    pub number_of_frames: usize,
    /// Interleaved f32 samples
    pub samples: Vec<f32>,
}

/// Output of one successful decode call
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedOutput {
    Video(VideoFrame),
    Audio(AudioData),
}

/// One platform codec instance
pub trait CodecSession: Send {
    /// Apply a configuration; the session becomes ready to decode
    fn configure(&mut self, config: &DecoderConfig) -> Result<(), CodecError>;

    /// Decode one chunk; `None` when the codec buffered it without output
    fn decode(&mut self, chunk: &EncodedChunk) -> Result<Option<DecodedOutput>, CodecError>;

    /// Drop configuration and any pending state
    fn reset(&mut self) -> Result<(), CodecError>;

    /// Release the codec
    fn close(&mut self) -> Result<(), CodecError>;
}

/// Creates codec sessions for new or recreated decoders
pub trait CodecFactory: Send + Sync {
    fn create(&self, kind: MediaKind) -> Result<Box<dyn CodecSession>, CodecError>;
}

/// Opus for audio, Annex-B pass-through for video
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCodecFactory;

impl CodecFactory for DefaultCodecFactory {
    fn create(&self, kind: MediaKind) -> Result<Box<dyn CodecSession>, CodecError> {
        Ok(match kind {
            MediaKind::Video => Box::new(AnnexBPassthrough::new()),
            MediaKind::Audio => Box::new(OpusDecoder::new()),
        })
    }
}
