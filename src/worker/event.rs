//! Events published by the worker

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::codec::VideoFrame;
use crate::error::Result;
use crate::protocol::{AudioDecoderConfig, VideoDecoderConfig};

/// Level carried by a `log` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Outbound event; serialises with a `type` tag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerEvent {
    #[serde(rename_all = "camelCase")]
    StreamInitialized {
        stream_id: String,
        subscriber_id: String,
    },
    #[serde(rename_all = "camelCase")]
    VideoData {
        frame: VideoFrame,
        stream_id: String,
        subscriber_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        /// Failing component, e.g. `video_decoder`
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        subscriber_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionClosed {
        stream: String,
        message: String,
        stream_id: String,
        subscriber_id: String,
    },
    #[serde(rename_all = "camelCase")]
    CodecReceived {
        stream: String,
        video_config: VideoDecoderConfig,
        audio_config: AudioDecoderConfig,
        stream_id: String,
        subscriber_id: String,
    },
    #[serde(rename = "TotalViewerCount", rename_all = "camelCase")]
    TotalViewerCount {
        count: u64,
        stream_id: String,
        subscriber_id: String,
    },
    #[serde(rename_all = "camelCase")]
    StreamRemoved {
        stream_id: String,
        subscriber_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Status {
        message: String,
        stream_id: String,
        subscriber_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Log {
        level: LogLevel,
        event: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        subscriber_id: Option<String>,
    },
}

impl WorkerEvent {
    /// Worker-wide log event
    pub fn log(level: LogLevel, event: &str, message: impl Into<String>) -> Self {
        WorkerEvent::Log {
            level,
            event: event.to_string(),
            message: message.into(),
            stream_id: None,
            subscriber_id: None,
        }
    }

    /// Log event about one stream
    pub fn stream_log(
        level: LogLevel,
        event: &str,
        message: impl Into<String>,
        stream_id: &str,
        subscriber_id: &str,
    ) -> Self {
        WorkerEvent::Log {
            level,
            event: event.to_string(),
            message: message.into(),
            stream_id: Some(stream_id.to_string()),
            subscriber_id: Some(subscriber_id.to_string()),
        }
    }

    pub fn error(
        message: impl Into<String>,
        error: Option<String>,
        stream_id: &str,
        subscriber_id: &str,
    ) -> Self {
        WorkerEvent::Error {
            message: message.into(),
            error,
            stream_id: Some(stream_id.to_string()),
            subscriber_id: Some(subscriber_id.to_string()),
        }
    }

    pub fn status(message: impl Into<String>, stream_id: &str, subscriber_id: &str) -> Self {
        WorkerEvent::Status {
            message: message.into(),
            stream_id: stream_id.to_string(),
            subscriber_id: subscriber_id.to_string(),
        }
    }

    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::StreamInitialized { .. } => "streamInitialized",
            WorkerEvent::VideoData { .. } => "videoData",
            WorkerEvent::Error { .. } => "error",
            WorkerEvent::ConnectionClosed { .. } => "connectionClosed",
            WorkerEvent::CodecReceived { .. } => "codecReceived",
            WorkerEvent::TotalViewerCount { .. } => "TotalViewerCount",
            WorkerEvent::StreamRemoved { .. } => "streamRemoved",
            WorkerEvent::Status { .. } => "status",
            WorkerEvent::Log { .. } => "log",
        }
    }

    /// Serialise with the wire shape consumers expect
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Sending side of the outbound event stream
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: WorkerEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("No event consumer, dropping {}", e.0.kind());
        }
    }
}
