//! Annex-B pass-through video session
//!
//! Hands each access unit to the consumer untouched, for hosts that render
//! through their own hardware decoder. Enforces the same reference rules a
//! real decoder does: after configure or reset the first unit must be a key
//! frame.

use crate::codec::{ChunkType, CodecSession, DecodedOutput, DecoderConfig, EncodedChunk, VideoFrame};
use crate::error::CodecError;
use crate::protocol::VideoDecoderConfig;

#[derive(Debug, Default)]
pub struct AnnexBPassthrough {
    config: Option<VideoDecoderConfig>,
    awaiting_key: bool,
}

impl AnnexBPassthrough {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodecSession for AnnexBPassthrough {
    fn configure(&mut self, config: &DecoderConfig) -> Result<(), CodecError> {
        let DecoderConfig::Video(config) = config else {
            return Err(CodecError::Configure("expected a video configuration".into()));
        };
        if config.codec.is_empty() {
            return Err(CodecError::Configure("empty codec string".into()));
        }

        self.config = Some(config.clone());
        self.awaiting_key = true;
        Ok(())
    }

    fn decode(&mut self, chunk: &EncodedChunk) -> Result<Option<DecodedOutput>, CodecError> {
        let config = self.config.as_ref().ok_or(CodecError::Unconfigured)?;

        let key_frame = chunk.chunk_type == ChunkType::Key;
        if self.awaiting_key && !key_frame {
            return Err(CodecError::KeyFrameRequired);
        }
        self.awaiting_key = false;

        Ok(Some(DecodedOutput::Video(VideoFrame {
            timestamp_us: chunk.timestamp_us,
            key_frame,
            codec: config.codec.clone(),
            coded_width: config.coded_width,
            coded_height: config.coded_height,
            data: chunk.data.clone(),
        })))
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        self.config = None;
        self.awaiting_key = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CodecError> {
        self.config = None;
        Ok(())
    }
}
