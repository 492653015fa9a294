//! Opus decoder session
//!
//! Starts unconfigured; `configure` builds the libopus decoder from the
//! stream's announced sample rate and channel count.

use opus::{Channels, Decoder};

use crate::codec::{AudioData, CodecSession, DecodedOutput, DecoderConfig, EncodedChunk};
use crate::error::CodecError;
use crate::protocol::AudioDecoderConfig;

/// Largest Opus frame: 120ms at 48kHz
const MAX_FRAME_SAMPLES: usize = 48000 * 120 / 1000;

/// Opus decoder wrapper
pub struct OpusDecoder {
    decoder: Option<Decoder>,
    sample_rate: u32,
    channels: u16,
    /// Decoding buffer (reused to avoid allocations)
    decode_buffer: Vec<f32>,
}

impl OpusDecoder {
    /// Create an unconfigured Opus decoder
    pub fn new() -> Self {
        Self {
            decoder: None,
            sample_rate: 0,
            channels: 0,
            decode_buffer: Vec::new(),
        }
    }

    fn build(config: &AudioDecoderConfig) -> Result<Decoder, CodecError> {
        if !config.codec.eq_ignore_ascii_case("opus") {
            return Err(CodecError::UnsupportedCodec(config.codec.clone()));
        }

        let channels = match config.number_of_channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            n => {
                return Err(CodecError::Configure(format!(
                    "Unsupported channel count: {}",
                    n
                )))
            }
        };

        Decoder::new(config.sample_rate, channels)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))
    }

    /// Get sample rate of the active configuration
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channel count of the active configuration
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Default for OpusDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecSession for OpusDecoder {
    fn configure(&mut self, config: &DecoderConfig) -> Result<(), CodecError> {
        let DecoderConfig::Audio(config) = config else {
            return Err(CodecError::Configure("expected an audio configuration".into()));
        };

        let decoder = Self::build(config)?;
        self.decoder = Some(decoder);
        self.sample_rate = config.sample_rate;
        self.channels = config.number_of_channels;
        self.decode_buffer = vec![0.0f32; MAX_FRAME_SAMPLES * self.channels as usize];
        Ok(())
    }

    fn decode(&mut self, chunk: &EncodedChunk) -> Result<Option<DecodedOutput>, CodecError> {
        let decoder = self.decoder.as_mut().ok_or(CodecError::Unconfigured)?;

        let samples = decoder
            .decode_float(&chunk.data, &mut self.decode_buffer, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        let total_samples = samples * self.channels as usize;

        Ok(Some(DecodedOutput::Audio(AudioData {
            timestamp_us: chunk.timestamp_us,
            sample_rate: self.sample_rate,
            number_of_channels: self.channels,
            number_of_frames: samples,
            samples: self.decode_buffer[..total_samples].to_vec(),
        })))
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        self.decoder = None;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CodecError> {
        self.decoder = None;
        self.decode_buffer = Vec::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ChunkType;
    use bytes::Bytes;
    use serde_json::Map;

    fn opus_config(sample_rate: u32, channels: u16) -> DecoderConfig {
        DecoderConfig::Audio(AudioDecoderConfig {
            codec: "opus".into(),
            sample_rate,
            number_of_channels: channels,
            description: None,
            extra: Map::new(),
        })
    }

    fn chunk(data: &'static [u8]) -> EncodedChunk {
        EncodedChunk {
            chunk_type: ChunkType::Key,
            timestamp_us: 20_000,
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_decoder_configuration() {
        let mut decoder = OpusDecoder::new();
        assert!(decoder.configure(&opus_config(48000, 2)).is_ok());
        assert_eq!(decoder.sample_rate(), 48000);
        assert_eq!(decoder.channels(), 2);
    }

    #[test]
    fn test_rejects_other_codecs() {
        let mut decoder = OpusDecoder::new();
        let DecoderConfig::Audio(mut config) = opus_config(48000, 2) else {
            unreachable!()
        };
        config.codec = "mp4a.40.2".into();

        let err = decoder.configure(&DecoderConfig::Audio(config)).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedCodec(_)));
    }

    #[test]
    fn test_rejects_surround() {
        let mut decoder = OpusDecoder::new();
        assert!(decoder.configure(&opus_config(48000, 6)).is_err());
    }

    #[test]
    fn test_decode_before_configure() {
        let mut decoder = OpusDecoder::new();
        assert_eq!(decoder.decode(&chunk(&[0xF8])), Err(CodecError::Unconfigured));
    }

    #[test]
    fn test_decode_silence_packet() {
        let mut decoder = OpusDecoder::new();
        decoder.configure(&opus_config(48000, 2)).unwrap();

        // TOC only: CELT fullband 20ms, zero-length frame (DTX)
        let output = decoder.decode(&chunk(&[0xF8])).unwrap();
        let Some(DecodedOutput::Audio(audio)) = output else {
            panic!("expected audio output");
        };

        assert_eq!(audio.timestamp_us, 20_000);
        assert_eq!(audio.number_of_channels, 2);
        assert!(audio.number_of_frames > 0);
        assert_eq!(audio.samples.len(), audio.number_of_frames * 2);
    }

    #[test]
    fn test_reset_drops_configuration() {
        let mut decoder = OpusDecoder::new();
        decoder.configure(&opus_config(48000, 1)).unwrap();
        decoder.reset().unwrap();
        assert_eq!(decoder.decode(&chunk(&[0xF8])), Err(CodecError::Unconfigured));
    }
}
