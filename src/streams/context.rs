//! Per-stream state

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::codec::{DecoderSet, DecoderState, MediaKind};
use crate::config::{AppConfig, BufferConfig};
use crate::constants::AUDIO_SAMPLES_PER_FRAME;
use crate::media::pacing::base_period_ms;
use crate::media::{AudioPort, JitterBuffer, Pacer};
use crate::network::SocketHandle;
use crate::protocol::{AudioDecoderConfig, VideoDecoderConfig};

/// Registry-wide settings applied to every new stream
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub buffer: BufferConfig,
    pub default_video_frame_rate: f64,
    /// Audio units per second until the stream announces its sample rate
    pub default_audio_frame_rate: f64,
    pub fallback_video: VideoDecoderConfig,
}

impl StreamSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            buffer: config.buffer.clone(),
            default_video_frame_rate: config.worker.default_video_frame_rate,
            default_audio_frame_rate: f64::from(config.worker.default_audio_sample_rate)
                / f64::from(AUDIO_SAMPLES_PER_FRAME),
            fallback_video: config.fallback_video.to_decoder_config(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Everything owned by one active stream
pub struct StreamContext {
    pub stream_id: String,
    pub subscriber_id: String,
    /// Distinguishes this context from earlier ones with the same stream id
    pub instance: u64,
    pub media_url: String,
    pub socket: Option<SocketHandle>,
    pub decoders: DecoderSet,
    pub video_config: Option<VideoDecoderConfig>,
    pub audio_config: Option<AudioDecoderConfig>,
    pub video_frame_rate: f64,
    pub audio_frame_rate: f64,
    pub video_buffer: JitterBuffer,
    pub audio_buffer: JitterBuffer,
    pub video_pacer: Pacer,
    pub audio_pacer: Pacer,
    pub video_config_received: bool,
    pub audio_config_received: bool,
    pub key_frame_received: bool,
    /// Decoded-audio channel supplied with `initStream`
    pub port: Option<AudioPort>,
    pub created_at: DateTime<Utc>,
}

impl StreamContext {
    pub fn buffer(&self, kind: MediaKind) -> &JitterBuffer {
        match kind {
            MediaKind::Video => &self.video_buffer,
            MediaKind::Audio => &self.audio_buffer,
        }
    }

    pub fn pacer(&self, kind: MediaKind) -> &Pacer {
        match kind {
            MediaKind::Video => &self.video_pacer,
            MediaKind::Audio => &self.audio_pacer,
        }
    }

    pub fn pacer_mut(&mut self, kind: MediaKind) -> &mut Pacer {
        match kind {
            MediaKind::Video => &mut self.video_pacer,
            MediaKind::Audio => &mut self.audio_pacer,
        }
    }

    /// Milliseconds between units at normal speed
    pub fn base_period(&self, kind: MediaKind) -> f64 {
        let rate = match kind {
            MediaKind::Video => self.video_frame_rate,
            MediaKind::Audio => self.audio_frame_rate,
        };
        base_period_ms(rate).unwrap_or(1000.0 / 60.0)
    }

    /// Adopt rates from newly received configs; non-positive rates are ignored
    pub fn apply_rates(&mut self) {
        if let Some(rate) = self.video_config.as_ref().and_then(|c| c.frame_rate) {
            if base_period_ms(rate).is_some() {
                self.video_frame_rate = rate;
            }
        }
        if let Some(config) = &self.audio_config {
            let rate = config.units_per_second();
            if base_period_ms(rate).is_some() {
                self.audio_frame_rate = rate;
            }
        }
    }

    /// Release everything the stream owns.
    ///
    /// Pacing is cancelled before the buffers are cleared; close failures are
    /// logged and otherwise ignored.
    pub fn teardown(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
        self.video_pacer.cancel();
        self.audio_pacer.cancel();
        for (kind, e) in self.decoders.close_all() {
            debug!(stream_id = %self.stream_id, kind = %kind, "Ignoring decoder close failure: {}", e);
        }
        self.video_buffer.clear();
        self.audio_buffer.clear();
    }

    pub fn stats(&self) -> StreamStats {
        let video = self.video_buffer.stats();
        let audio = self.audio_buffer.stats();
        StreamStats {
            stream_id: self.stream_id.clone(),
            subscriber_id: self.subscriber_id.clone(),
            video_buffer: video.level,
            audio_buffer: audio.level,
            video_playing: self.video_pacer.is_running(),
            audio_playing: self.audio_pacer.is_running(),
            video_halted: self.video_pacer.is_halted(),
            audio_halted: self.audio_pacer.is_halted(),
            video_decoder_state: self.decoders.state(MediaKind::Video),
            audio_decoder_state: self.decoders.state(MediaKind::Audio),
            video_speed: self.video_pacer.state().map(|s| s.speed),
            audio_speed: self.audio_pacer.state().map(|s| s.speed),
            dropped_video: video.dropped,
            dropped_audio: audio.dropped,
            created_at: self.created_at,
        }
    }
}

/// Point-in-time view of one stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub stream_id: String,
    pub subscriber_id: String,
    pub video_buffer: usize,
    pub audio_buffer: usize,
    pub video_playing: bool,
    pub audio_playing: bool,
    /// Waiting for a reconfigure after an unconfigured-codec failure
    pub video_halted: bool,
    pub audio_halted: bool,
    pub video_decoder_state: Option<DecoderState>,
    pub audio_decoder_state: Option<DecoderState>,
    pub video_speed: Option<i8>,
    pub audio_speed: Option<i8>,
    pub dropped_video: u64,
    pub dropped_audio: u64,
    pub created_at: DateTime<Utc>,
}
