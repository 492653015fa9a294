//! Active streams and everything that happens to them
//!
//! The registry is driven from the worker loop: commands create and remove
//! streams, and socket events, pacing ticks and decoder results are handed to
//! the matching `on_*` method. Every event carries the context instance it was
//! produced for, so events from a torn-down or replaced stream are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::codec::{
    ChunkType, CodecFactory, DecodedOutput, DecoderConfig, DecoderEvent, DecoderEventBody,
    DecoderOrigin, DecoderSet, DecoderState, EncodedChunk, MediaKind, Recovery,
};
use crate::constants::TIMESTAMP_SCALE_US;
use crate::error::{Result, StreamError};
use crate::media::{AudioPort, ChannelRouter, DecodedAudio, JitterBuffer, Pacer, PacingTick, RouteOutcome};
use crate::network::{Connector, SocketEnvelope, SocketEvent, SocketHandle, SocketMessage, SocketSink};
use crate::protocol::{decode_text, parse_frame, AudioDecoderConfig, DecoderConfigs, FrameRecord, FrameType, InboundMessage};
use crate::streams::context::{StreamContext, StreamSettings, StreamStats};
use crate::worker::event::{EventSink, LogLevel, WorkerEvent};

/// Senders handed to sockets, decoders and pacing tasks
#[derive(Clone)]
pub struct RegistryChannels {
    pub sockets: mpsc::UnboundedSender<SocketEnvelope>,
    pub decoders: mpsc::UnboundedSender<DecoderEvent>,
    pub ticks: mpsc::UnboundedSender<PacingTick>,
    pub events: EventSink,
}

/// Derive the stream id from the last path segment of a media URL
pub fn stream_id_from_url(media_url: &str) -> std::result::Result<String, StreamError> {
    let url = Url::parse(media_url)
        .map_err(|e| StreamError::InvalidMediaUrl(format!("{}: {}", media_url, e)))?;

    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| StreamError::InvalidMediaUrl(media_url.to_owned()))
}

/// Owned set of stream contexts plus the subscriber channel table
pub struct StreamRegistry {
    streams: HashMap<String, StreamContext>,
    router: ChannelRouter,
    connector: Arc<dyn Connector>,
    codecs: Arc<dyn CodecFactory>,
    settings: StreamSettings,
    channels: RegistryChannels,
    next_instance: u64,
    next_connection: u64,
}

impl StreamRegistry {
    pub fn new(
        settings: StreamSettings,
        connector: Arc<dyn Connector>,
        codecs: Arc<dyn CodecFactory>,
        channels: RegistryChannels,
    ) -> Self {
        Self {
            streams: HashMap::new(),
            router: ChannelRouter::new(),
            connector,
            codecs,
            settings,
            channels,
            next_instance: 0,
            next_connection: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn get(&self, stream_id: &str) -> Option<&StreamContext> {
        self.streams.get(stream_id)
    }

    /// Create a stream for `media_url`, replacing any stream with the same id
    pub fn init_stream(
        &mut self,
        subscriber_id: &str,
        media_url: &str,
        port: Option<AudioPort>,
    ) -> Result<String> {
        let stream_id = stream_id_from_url(media_url)?;

        if self.streams.contains_key(&stream_id) {
            warn!(stream_id = %stream_id, "Stream already exists, removing old one");
            self.remove_stream(&stream_id);
        }

        self.next_instance += 1;
        let instance = self.next_instance;
        let origin = DecoderOrigin {
            stream_id: stream_id.clone(),
            subscriber_id: subscriber_id.to_string(),
            instance,
        };
        let settings = &self.settings;

        let mut context = StreamContext {
            stream_id: stream_id.clone(),
            subscriber_id: subscriber_id.to_string(),
            instance,
            media_url: media_url.to_string(),
            socket: None,
            decoders: DecoderSet::new(self.codecs.clone(), origin, self.channels.decoders.clone()),
            video_config: None,
            audio_config: None,
            video_frame_rate: settings.default_video_frame_rate,
            audio_frame_rate: settings.default_audio_frame_rate,
            video_buffer: JitterBuffer::new(settings.buffer.video_capacity),
            audio_buffer: JitterBuffer::new(settings.buffer.audio_capacity),
            video_pacer: Pacer::new(MediaKind::Video, &stream_id, instance, self.channels.ticks.clone()),
            audio_pacer: Pacer::new(MediaKind::Audio, &stream_id, instance, self.channels.ticks.clone()),
            video_config_received: false,
            audio_config_received: false,
            key_frame_received: false,
            port,
            created_at: Utc::now(),
        };

        self.next_connection += 1;
        context.socket = Some(open_socket(
            self.connector.as_ref(),
            &self.channels.sockets,
            self.next_connection,
            &context,
        ));

        info!(stream_id = %stream_id, subscriber_id = %subscriber_id, "Created stream");
        let initialized = initialize_decoders(&mut context, &self.channels.events);
        self.streams.insert(stream_id.clone(), context);
        initialized?;

        self.channels.events.emit(WorkerEvent::StreamInitialized {
            stream_id: stream_id.clone(),
            subscriber_id: subscriber_id.to_string(),
        });
        Ok(stream_id)
    }

    /// Tear down the stream matching `id` as stream id or subscriber id.
    ///
    /// Returns `false` (and logs) when nothing matched.
    pub fn remove_stream(&mut self, id: &str) -> bool {
        let key = if self.streams.contains_key(id) {
            Some(id.to_string())
        } else {
            self.streams
                .values()
                .find(|context| context.subscriber_id == id)
                .map(|context| context.stream_id.clone())
        };

        let Some(mut context) = key.and_then(|key| self.streams.remove(&key)) else {
            warn!("Stream not found: {}", id);
            return false;
        };

        context.teardown();
        info!(
            stream_id = %context.stream_id,
            subscriber_id = %context.subscriber_id,
            "Removed stream"
        );
        self.channels.events.emit(WorkerEvent::StreamRemoved {
            stream_id: context.stream_id,
            subscriber_id: context.subscriber_id,
        });
        true
    }

    /// Remove every stream
    pub fn stop_all(&mut self) {
        let ids: Vec<String> = self.streams.keys().cloned().collect();
        for id in ids {
            self.remove_stream(&id);
        }

        info!("Stopped all streams");
        self.channels.events.emit(WorkerEvent::log(
            LogLevel::Info,
            "stop-all",
            "Stopped all operations and cleaned up per-stream resources",
        ));
    }

    /// Close and reopen every stream socket; decoders and buffers are kept
    pub fn reset(&mut self) {
        for context in self.streams.values_mut() {
            if let Some(socket) = context.socket.take() {
                socket.close();
            }
            self.next_connection += 1;
            context.socket = Some(open_socket(
                self.connector.as_ref(),
                &self.channels.sockets,
                self.next_connection,
                context,
            ));
            info!(stream_id = %context.stream_id, "Reopened stream socket");
        }
    }

    pub fn add_subscriber_channel_port(&mut self, subscriber_id: &str, port: AudioPort) {
        if self.router.register(subscriber_id, port).is_some() {
            debug!(subscriber_id = %subscriber_id, "Replaced subscriber channel");
        }
    }

    pub fn remove_subscriber_channel_port(&mut self, subscriber_id: &str) -> bool {
        self.router.unregister(subscriber_id).is_some()
    }

    /// Stats for every stream, ordered by stream id
    pub fn snapshot(&self) -> Vec<StreamStats> {
        let mut stats: Vec<StreamStats> = self.streams.values().map(StreamContext::stats).collect();
        stats.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));
        stats
    }

    pub fn log_stats(&self) {
        for stats in self.snapshot() {
            info!(
                stream_id = %stats.stream_id,
                subscriber_id = %stats.subscriber_id,
                video_buffer = stats.video_buffer,
                audio_buffer = stats.audio_buffer,
                video_playing = stats.video_playing,
                audio_playing = stats.audio_playing,
                video_halted = stats.video_halted,
                audio_halted = stats.audio_halted,
                video_speed = ?stats.video_speed,
                audio_speed = ?stats.audio_speed,
                dropped_video = stats.dropped_video,
                dropped_audio = stats.dropped_audio,
                "Stream stats"
            );
        }
    }

    pub fn on_socket_event(&mut self, envelope: SocketEnvelope) {
        let Some(context) = self.streams.get_mut(&envelope.stream_id) else {
            debug!(stream_id = %envelope.stream_id, "Socket event for unknown stream");
            return;
        };
        let current = context.instance == envelope.instance
            && context.socket.as_ref().map(SocketHandle::connection) == Some(envelope.connection);
        if !current {
            debug!(stream_id = %envelope.stream_id, "Dropping event from a replaced socket");
            return;
        }

        let events = &self.channels.events;
        match envelope.event {
            SocketEvent::Opened => {
                info!(stream_id = %context.stream_id, "WebSocket connected");
                events.emit(WorkerEvent::stream_log(
                    LogLevel::Info,
                    "ws-connected",
                    format!("WebSocket connected for stream {}", context.stream_id),
                    &context.stream_id,
                    &context.subscriber_id,
                ));
            }
            SocketEvent::Closed => {
                warn!(stream_id = %context.stream_id, "WebSocket closed");
                events.emit(WorkerEvent::ConnectionClosed {
                    stream: "media".to_string(),
                    message: format!("WebSocket closed for stream {}", context.stream_id),
                    stream_id: context.stream_id.clone(),
                    subscriber_id: context.subscriber_id.clone(),
                });
            }
            SocketEvent::Error(e) => {
                error!(stream_id = %context.stream_id, "WebSocket error: {}", e);
                events.emit(WorkerEvent::error(
                    format!("WebSocket error for stream {}: {}", context.stream_id, e),
                    None,
                    &context.stream_id,
                    &context.subscriber_id,
                ));
            }
            SocketEvent::Message(SocketMessage::Text(text)) => handle_text(context, events, &text),
            SocketEvent::Message(SocketMessage::Binary(data)) => {
                handle_binary(context, events, &self.settings, data)
            }
        }
    }

    /// One pacing period elapsed: retune, then feed one frame to the decoder
    pub fn on_pacing_tick(&mut self, tick: PacingTick) {
        let Some(context) = self.streams.get_mut(&tick.stream_id) else {
            return;
        };
        if context.instance != tick.instance || !context.pacer(tick.kind).is_current(tick.generation) {
            debug!(stream_id = %tick.stream_id, kind = %tick.kind, "Dropping stale pacing tick");
            return;
        }

        let kind = tick.kind;
        let occupancy = context.buffer(kind).len();
        let base = context.base_period(kind);
        if context.pacer_mut(kind).retune(occupancy, base) {
            debug!(
                stream_id = %context.stream_id,
                kind = %kind,
                occupancy,
                speed = ?context.pacer(kind).state().map(|s| s.speed),
                "Pacing speed changed"
            );
        }

        // A retune never consumes the tick, for audio as well as video
        let events = &self.channels.events;
        match kind {
            MediaKind::Video => {
                let config = video_recovery_config(context, &self.settings);
                recover_decoder(context, events, MediaKind::Video, Some(config));
                feed_video(context, events);
            }
            MediaKind::Audio => {
                let config = context.audio_config.clone().map(DecoderConfig::Audio);
                recover_decoder(context, events, MediaKind::Audio, config);
                feed_audio(context, events);
            }
        }
    }

    /// Forward decoder output; audio goes through the channel router
    pub fn on_decoder_event(&mut self, event: DecoderEvent) {
        let Some(context) = self.streams.get(&event.origin.stream_id) else {
            return;
        };
        if context.instance != event.origin.instance {
            debug!(stream_id = %event.origin.stream_id, "Dropping output of a replaced decoder");
            return;
        }

        let events = &self.channels.events;
        match event.body {
            DecoderEventBody::Output(DecodedOutput::Video(frame)) => {
                events.emit(WorkerEvent::VideoData {
                    frame,
                    stream_id: context.stream_id.clone(),
                    subscriber_id: context.subscriber_id.clone(),
                });
            }
            DecoderEventBody::Output(DecodedOutput::Audio(audio)) => {
                let outcome = self.router.route(
                    &context.subscriber_id,
                    context.port.as_ref(),
                    DecodedAudio::from(audio),
                );
                match outcome {
                    RouteOutcome::Delivered => {}
                    RouteOutcome::Full => {
                        debug!(subscriber_id = %context.subscriber_id, "Audio channel full, dropping output")
                    }
                    RouteOutcome::Closed => {
                        debug!(subscriber_id = %context.subscriber_id, "Audio channel closed, dropping output")
                    }
                    RouteOutcome::NoChannel => {}
                }
            }
            DecoderEventBody::Error(message) => {
                events.emit(WorkerEvent::error(
                    format!(
                        "{} decoder error for stream {}: {}",
                        label(event.kind),
                        context.stream_id,
                        message
                    ),
                    Some(component(event.kind)),
                    &context.stream_id,
                    &context.subscriber_id,
                ));
            }
        }
    }
}

fn open_socket(
    connector: &dyn Connector,
    sockets: &mpsc::UnboundedSender<SocketEnvelope>,
    connection: u64,
    context: &StreamContext,
) -> SocketHandle {
    let sink = SocketSink::new(
        context.stream_id.clone(),
        context.instance,
        connection,
        sockets.clone(),
    );
    connector.open(&context.media_url, sink)
}

fn initialize_decoders(context: &mut StreamContext, events: &EventSink) -> Result<()> {
    events.emit(WorkerEvent::stream_log(
        LogLevel::Info,
        "init-stream-decoders",
        format!("Initializing decoders for stream {}", context.stream_id),
        &context.stream_id,
        &context.subscriber_id,
    ));

    match context.decoders.initialize() {
        Ok(()) => {
            info!(stream_id = %context.stream_id, "Decoders initialized");
            events.emit(WorkerEvent::stream_log(
                LogLevel::Info,
                "stream-decoders-init-success",
                format!("Decoders initialized successfully for stream {}", context.stream_id),
                &context.stream_id,
                &context.subscriber_id,
            ));
            Ok(())
        }
        Err(e) => {
            error!(stream_id = %context.stream_id, "Failed to initialize decoders: {}", e);
            events.emit(WorkerEvent::stream_log(
                LogLevel::Error,
                "stream-decoders-init-fail",
                format!("Failed to initialize decoders for stream {}: {}", context.stream_id, e),
                &context.stream_id,
                &context.subscriber_id,
            ));
            Err(e.into())
        }
    }
}

fn label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "Video",
        MediaKind::Audio => "Audio",
    }
}

fn component(kind: MediaKind) -> String {
    format!("{}_decoder", kind)
}

fn handle_text(context: &mut StreamContext, events: &EventSink, text: &str) {
    let message = match decode_text(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(stream_id = %context.stream_id, "{}", e);
            events.emit(WorkerEvent::stream_log(
                LogLevel::Warn,
                "malformed-control",
                format!("Ignoring control message on stream {}: {}", context.stream_id, e),
                &context.stream_id,
                &context.subscriber_id,
            ));
            return;
        }
    };

    match message {
        InboundMessage::ViewerCount(count) => {
            events.emit(WorkerEvent::TotalViewerCount {
                count,
                stream_id: context.stream_id.clone(),
                subscriber_id: context.subscriber_id.clone(),
            });
        }
        InboundMessage::DecoderConfigs(configs) => {
            if context.video_config_received && context.audio_config_received {
                debug!(stream_id = %context.stream_id, "Decoder configs already applied");
                return;
            }
            apply_decoder_configs(context, events, configs);
        }
        InboundMessage::Publish => {
            info!(stream_id = %context.stream_id, "New publish session, resetting decoders");
            for (kind, e) in context.decoders.reset_all() {
                warn!(stream_id = %context.stream_id, kind = %kind, "Decoder reset failed: {}", e);
            }
            context.video_config_received = false;
            context.audio_config_received = false;
        }
        InboundMessage::Ping => {}
        InboundMessage::Unrecognized(kind) => {
            debug!(stream_id = %context.stream_id, "Ignoring control message {}", kind);
        }
    }
}

fn apply_decoder_configs(context: &mut StreamContext, events: &EventSink, configs: DecoderConfigs) {
    context.video_config = Some(configs.video_config.clone());
    context.audio_config = Some(configs.audio_config.clone());
    context.apply_rates();

    let pending = [
        (MediaKind::Video, DecoderConfig::Video(configs.video_config.clone())),
        (MediaKind::Audio, DecoderConfig::Audio(configs.audio_config.clone())),
    ];
    for (kind, config) in pending {
        match context.decoders.configure_if_unconfigured(kind, &config) {
            Ok(true) => {
                debug!(stream_id = %context.stream_id, kind = %kind, "Decoder configured");
                context.pacer_mut(kind).clear_halt();
            }
            Ok(false) => {}
            Err(e) => {
                warn!(stream_id = %context.stream_id, kind = %kind, "Decoder configure failed: {}", e);
                events.emit(WorkerEvent::error(
                    format!("{} decoder configure failed for stream {}: {}", label(kind), context.stream_id, e),
                    Some(component(kind)),
                    &context.stream_id,
                    &context.subscriber_id,
                ));
            }
        }
    }

    prime_audio_decoder(context, &configs.audio_config);

    context.video_config_received = true;
    context.audio_config_received = true;

    events.emit(WorkerEvent::CodecReceived {
        stream: "both".to_string(),
        video_config: configs.video_config,
        audio_config: configs.audio_config,
        stream_id: context.stream_id.clone(),
        subscriber_id: context.subscriber_id.clone(),
    });
}

/// Decode the audio unit carried in the config descriptor to warm up the decoder
fn prime_audio_decoder(context: &mut StreamContext, config: &AudioDecoderConfig) {
    let Some((timestamp, data)) = config.priming_unit() else {
        debug!(stream_id = %context.stream_id, "No priming unit in audio config");
        return;
    };
    let chunk = EncodedChunk {
        chunk_type: ChunkType::Key,
        timestamp_us: u64::from(timestamp) * TIMESTAMP_SCALE_US,
        data,
    };

    if let Some(decoder) = context.decoders.get_mut(MediaKind::Audio) {
        match decoder.decode(&chunk) {
            Ok(()) => debug!(stream_id = %context.stream_id, "Decoded first audio frame"),
            Err(e) => debug!(stream_id = %context.stream_id, "Error decoding first audio frame: {}", e),
        }
    }
}

fn handle_binary(context: &mut StreamContext, events: &EventSink, settings: &StreamSettings, data: Bytes) {
    let frame = match parse_frame(data) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(stream_id = %context.stream_id, "{}", e);
            events.emit(WorkerEvent::stream_log(
                LogLevel::Warn,
                "malformed-frame",
                format!("Dropping frame on stream {}: {}", context.stream_id, e),
                &context.stream_id,
                &context.subscriber_id,
            ));
            return;
        }
    };

    match frame.frame_type {
        FrameType::Audio => {
            let config = context.audio_config.clone().map(DecoderConfig::Audio);
            recover_decoder(context, events, MediaKind::Audio, config);
            buffer_frame(context, MediaKind::Audio, frame, settings.buffer.audio_start_threshold);
        }
        FrameType::Key | FrameType::Delta => {
            if frame.frame_type == FrameType::Key {
                context.key_frame_received = true;
            }
            if !context.key_frame_received {
                debug!(stream_id = %context.stream_id, "Dropping delta frame before first key frame");
                return;
            }
            let config = video_recovery_config(context, settings);
            recover_decoder(context, events, MediaKind::Video, Some(config));
            buffer_frame(context, MediaKind::Video, frame, settings.buffer.video_start_threshold);
        }
        FrameType::Config => {
            warn!(
                stream_id = %context.stream_id,
                "Received unexpected config frame ({} bytes)",
                frame.payload.len()
            );
        }
        FrameType::Unknown(code) => {
            debug!(stream_id = %context.stream_id, "Ignoring frame with unknown type {}", code);
        }
    }
}

fn video_recovery_config(context: &StreamContext, settings: &StreamSettings) -> DecoderConfig {
    DecoderConfig::Video(
        context
            .video_config
            .clone()
            .unwrap_or_else(|| settings.fallback_video.clone()),
    )
}

/// Replace a closed decoder before it is fed
fn recover_decoder(
    context: &mut StreamContext,
    events: &EventSink,
    kind: MediaKind,
    config: Option<DecoderConfig>,
) {
    match context.decoders.ensure_open(kind, config.as_ref()) {
        Ok(Recovery::Untouched) => {}
        Ok(Recovery::Recreated) => {
            info!(stream_id = %context.stream_id, kind = %kind, "Recreated closed decoder");
            context.pacer_mut(kind).clear_halt();
        }
        Ok(Recovery::RecreatedUnconfigured) => {
            info!(stream_id = %context.stream_id, kind = %kind, "Recreated closed decoder, awaiting configuration");
        }
        Err(e) => {
            warn!(stream_id = %context.stream_id, kind = %kind, "Decoder recreation failed: {}", e);
            events.emit(WorkerEvent::error(
                format!("{} decoder recreation failed for stream {}: {}", label(kind), context.stream_id, e),
                Some(component(kind)),
                &context.stream_id,
                &context.subscriber_id,
            ));
        }
    }
}

fn buffer_frame(context: &mut StreamContext, kind: MediaKind, frame: FrameRecord, threshold: usize) {
    if let Some(dropped) = context.buffer(kind).push(frame) {
        debug!(
            stream_id = %context.stream_id,
            kind = %kind,
            timestamp = dropped.timestamp,
            "Jitter buffer full, dropped oldest frame"
        );
    }

    let occupancy = context.buffer(kind).len();
    let base = context.base_period(kind);
    let pacer = context.pacer_mut(kind);
    if pacer.should_start(occupancy, threshold) {
        pacer.start(base);
        info!(stream_id = %context.stream_id, kind = %kind, occupancy, "Playback started");
    }
}

fn chunk_from(frame: FrameRecord) -> EncodedChunk {
    EncodedChunk {
        chunk_type: if frame.frame_type == FrameType::Delta {
            ChunkType::Delta
        } else {
            ChunkType::Key
        },
        timestamp_us: u64::from(frame.timestamp) * TIMESTAMP_SCALE_US,
        data: frame.payload,
    }
}

fn feed_video(context: &mut StreamContext, events: &EventSink) {
    if let Some(frame) = context.video_buffer.pop() {
        decode_chunk(context, events, MediaKind::Video, chunk_from(frame));
    }
}

fn feed_audio(context: &mut StreamContext, events: &EventSink) {
    if context.audio_buffer.is_empty() {
        return;
    }

    match context.decoders.state(MediaKind::Audio) {
        Some(DecoderState::Configured) => {
            if let Some(frame) = context.audio_buffer.pop() {
                decode_chunk(context, events, MediaKind::Audio, chunk_from(frame));
            }
        }
        Some(state) => {
            // Frame stays queued until the decoder can take it
            events.emit(WorkerEvent::status(
                format!("Waiting for audio decoder ({}) - stream {}", state.as_str(), context.stream_id),
                &context.stream_id,
                &context.subscriber_id,
            ));
            if state == DecoderState::Unconfigured {
                reconfigure_audio(context, events);
            }
        }
        None => {
            context.audio_buffer.pop();
        }
    }
}

fn reconfigure_audio(context: &mut StreamContext, events: &EventSink) {
    let Some(config) = context.audio_config.clone().map(DecoderConfig::Audio) else {
        return;
    };
    let Some(decoder) = context.decoders.get_mut(MediaKind::Audio) else {
        return;
    };

    match decoder.configure(&config) {
        Ok(()) => {
            context.audio_pacer.clear_halt();
            events.emit(WorkerEvent::status(
                format!("Audio decoder reconfigured for stream {}", context.stream_id),
                &context.stream_id,
                &context.subscriber_id,
            ));
        }
        Err(e) => {
            events.emit(WorkerEvent::error(
                format!("Failed to reconfigure audio for stream {}: {}", context.stream_id, e),
                None,
                &context.stream_id,
                &context.subscriber_id,
            ));
        }
    }
}

fn decode_chunk(context: &mut StreamContext, events: &EventSink, kind: MediaKind, chunk: EncodedChunk) {
    let Some(decoder) = context.decoders.get_mut(kind) else {
        return;
    };
    let Err(e) = decoder.decode(&chunk) else {
        return;
    };

    warn!(stream_id = %context.stream_id, kind = %kind, "Decode failed: {}", e);
    events.emit(WorkerEvent::error(
        format!("{} decode error for stream {}: {}", label(kind), context.stream_id, e),
        None,
        &context.stream_id,
        &context.subscriber_id,
    ));

    if e.is_unconfigured() {
        context.pacer_mut(kind).halt();
        events.emit(WorkerEvent::status(
            format!("{} decoder reset for stream {}", label(kind), context.stream_id),
            &context.stream_id,
            &context.subscriber_id,
        ));
    }
}
