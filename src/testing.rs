//! Test doubles shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Map;
use tokio_util::sync::CancellationToken;

use crate::codec::{
    AudioData, ChunkType, CodecFactory, CodecSession, DecodedOutput, DecoderConfig, EncodedChunk,
    MediaKind, VideoFrame,
};
use crate::error::CodecError;
use crate::network::{Connector, SocketHandle, SocketSink};
use crate::protocol::{AudioDecoderConfig, VideoDecoderConfig};

/// Opus-style priming descriptor: timestamp 1000, audio type, payload `[FC FF FE]`
pub const AUDIO_DESCRIPTION: [u8; 8] = [0x00, 0x00, 0x03, 0xE8, 0x02, 0xFC, 0xFF, 0xFE];

pub fn raw_video_config() -> VideoDecoderConfig {
    VideoDecoderConfig {
        codec: "hev1.1.6.L93.B0".into(),
        coded_width: Some(1280),
        coded_height: Some(720),
        frame_rate: Some(30.0),
        description: Some(Bytes::from_static(&[0, 1, 2, 3])),
        extra: Map::new(),
    }
}

pub fn raw_audio_config() -> AudioDecoderConfig {
    AudioDecoderConfig {
        codec: "opus".into(),
        sample_rate: 48000,
        number_of_channels: 2,
        description: Some(Bytes::from_static(&AUDIO_DESCRIPTION)),
        extra: Map::new(),
    }
}

pub fn video_decoder_config() -> DecoderConfig {
    DecoderConfig::Video(raw_video_config())
}

pub fn audio_decoder_config() -> DecoderConfig {
    DecoderConfig::Audio(raw_audio_config())
}

/// `DecoderConfigs` control message matching the raw configs above
pub fn decoder_configs_text() -> String {
    serde_json::json!({
        "type": "DecoderConfigs",
        "videoConfig": raw_video_config(),
        "audioConfig": raw_audio_config(),
    })
    .to_string()
}

/// Binary frame in wire layout
pub fn frame_bytes(timestamp: u32, frame_type: u8, payload: &[u8]) -> Bytes {
    let mut data = Vec::with_capacity(5 + payload.len());
    data.extend_from_slice(&timestamp.to_be_bytes());
    data.push(frame_type);
    data.extend_from_slice(payload);
    Bytes::from(data)
}

#[derive(Default)]
struct Script {
    created: HashMap<MediaKind, usize>,
    configure_calls: HashMap<MediaKind, usize>,
    decoded: Vec<(MediaKind, EncodedChunk)>,
    fail_decodes: HashSet<MediaKind>,
    fail_configures: HashSet<MediaKind>,
}

/// Codec factory whose sessions record calls and fail on request
#[derive(Clone, Default)]
pub struct ScriptedCodecFactory {
    script: Arc<Mutex<Script>>,
}

impl ScriptedCodecFactory {
    pub fn created(&self, kind: MediaKind) -> usize {
        self.script.lock().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn configure_calls(&self, kind: MediaKind) -> usize {
        self.script
            .lock()
            .configure_calls
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    /// Timestamps of every chunk handed to a `kind` session, in order
    pub fn decoded(&self, kind: MediaKind) -> Vec<u64> {
        self.script
            .lock()
            .decoded
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, chunk)| chunk.timestamp_us)
            .collect()
    }

    pub fn fail_decodes(&self, kind: MediaKind, fail: bool) {
        toggle(&mut self.script.lock().fail_decodes, kind, fail);
    }

    pub fn fail_configures(&self, kind: MediaKind, fail: bool) {
        toggle(&mut self.script.lock().fail_configures, kind, fail);
    }
}

fn toggle(set: &mut HashSet<MediaKind>, kind: MediaKind, on: bool) {
    if on {
        set.insert(kind);
    } else {
        set.remove(&kind);
    }
}

impl CodecFactory for ScriptedCodecFactory {
    fn create(&self, kind: MediaKind) -> Result<Box<dyn CodecSession>, CodecError> {
        *self.script.lock().created.entry(kind).or_default() += 1;
        Ok(Box::new(ScriptedSession {
            kind,
            script: self.script.clone(),
            config: None,
        }))
    }
}

struct ScriptedSession {
    kind: MediaKind,
    script: Arc<Mutex<Script>>,
    config: Option<DecoderConfig>,
}

impl CodecSession for ScriptedSession {
    fn configure(&mut self, config: &DecoderConfig) -> Result<(), CodecError> {
        let mut script = self.script.lock();
        *script.configure_calls.entry(self.kind).or_default() += 1;
        if script.fail_configures.contains(&self.kind) {
            return Err(CodecError::Configure("scripted failure".into()));
        }
        self.config = Some(config.clone());
        Ok(())
    }

    fn decode(&mut self, chunk: &EncodedChunk) -> Result<Option<DecodedOutput>, CodecError> {
        let mut script = self.script.lock();
        script.decoded.push((self.kind, chunk.clone()));
        if script.fail_decodes.contains(&self.kind) {
            return Err(CodecError::DecodingFailed("scripted failure".into()));
        }

        Ok(Some(match self.kind {
            MediaKind::Audio => {
                let sample_rate = match &self.config {
                    Some(DecoderConfig::Audio(config)) => config.sample_rate,
                    _ => 48000,
                };
                DecodedOutput::Audio(AudioData {
                    timestamp_us: chunk.timestamp_us,
                    sample_rate,
                    number_of_channels: 2,
                    number_of_frames: 4,
                    samples: vec![0.25, -0.25, 0.5, -0.5, 0.75, -0.75, 1.0, -1.0],
                })
            }
            MediaKind::Video => DecodedOutput::Video(VideoFrame {
                timestamp_us: chunk.timestamp_us,
                key_frame: chunk.chunk_type == ChunkType::Key,
                codec: match &self.config {
                    Some(DecoderConfig::Video(config)) => config.codec.clone(),
                    _ => String::new(),
                },
                coded_width: None,
                coded_height: None,
                data: chunk.data.clone(),
            }),
        }))
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        self.config = None;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CodecError> {
        self.config = None;
        Ok(())
    }
}

struct OpenedSocket {
    url: String,
    sink: SocketSink,
    cancel: CancellationToken,
}

/// Connector that records opens and lets tests inject socket events
#[derive(Clone, Default)]
pub struct RecordingConnector {
    opened: Arc<Mutex<Vec<OpenedSocket>>>,
}

impl RecordingConnector {
    pub fn opened(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.opened.lock().iter().map(|s| s.url.clone()).collect()
    }

    /// Sink of the `index`-th opened socket
    pub fn sink(&self, index: usize) -> SocketSink {
        self.opened.lock()[index].sink.clone()
    }

    pub fn last_sink(&self) -> SocketSink {
        let opened = self.opened.lock();
        opened[opened.len() - 1].sink.clone()
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.opened.lock()[index].cancel.is_cancelled()
    }
}

impl Connector for RecordingConnector {
    fn open(&self, url: &str, sink: SocketSink) -> SocketHandle {
        let cancel = CancellationToken::new();
        let connection = sink.connection();
        self.opened.lock().push(OpenedSocket {
            url: url.to_owned(),
            sink,
            cancel: cancel.clone(),
        });
        SocketHandle::new(connection, cancel)
    }
}
