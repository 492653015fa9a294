//! Commands accepted by the worker

use serde::Deserialize;
use tokio::sync::oneshot;

use crate::media::AudioPort;
use crate::streams::StreamStats;

/// Stream parameters supplied with `initStream`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Socket URL; its last path segment is the stream id
    pub media_url: String,
}

/// Messages sent to the worker task
#[derive(Debug)]
pub enum Command {
    /// Create (or replace) the stream behind `data.media_url`
    InitStream {
        subscriber_id: String,
        data: StreamConfig,
        /// Decoded-audio channel used when the subscriber has no registered one
        port: Option<AudioPort>,
    },

    /// Tear down a stream, looked up by stream id or subscriber id
    RemoveStream { subscriber_id: String },

    /// Reopen every stream socket
    Reset,

    /// Tear down every stream
    Stop,

    /// Bind a subscriber's decoded-audio channel
    AddSubscriberChannelPort {
        subscriber_id: String,
        port: AudioPort,
    },

    /// Drop a subscriber's decoded-audio channel
    RemoveSubscriberChannelPort { subscriber_id: String },

    /// Report the state of every stream
    Snapshot {
        respond_to: oneshot::Sender<Vec<StreamStats>>,
    },
}

impl Command {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::InitStream { .. } => "initStream",
            Command::RemoveStream { .. } => "removeStream",
            Command::Reset => "reset",
            Command::Stop => "stop",
            Command::AddSubscriberChannelPort { .. } => "addSubscriberChannelPort",
            Command::RemoveSubscriberChannelPort { .. } => "removeSubscriberChannelPort",
            Command::Snapshot { .. } => "snapshot",
        }
    }

    pub fn subscriber_id(&self) -> Option<&str> {
        match self {
            Command::InitStream { subscriber_id, .. }
            | Command::RemoveStream { subscriber_id }
            | Command::AddSubscriberChannelPort { subscriber_id, .. }
            | Command::RemoveSubscriberChannelPort { subscriber_id } => Some(subscriber_id),
            Command::Reset | Command::Stop | Command::Snapshot { .. } => None,
        }
    }
}
