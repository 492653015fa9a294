//! Per-stream media socket
//!
//! A [`Connector`] opens one connection per stream and pushes everything that
//! happens on it onto the worker's socket channel, tagged with the stream, the
//! context instance and a connection id so events from a replaced socket can
//! be told apart.

use async_tungstenite::tokio::connect_async;
use async_tungstenite::tungstenite::Message;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::NetworkError;

/// A message read off the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketMessage {
    Text(String),
    Binary(Bytes),
}

/// Something that happened on a stream socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Message(SocketMessage),
    Closed,
    Error(String),
}

/// A socket event tagged with its origin
#[derive(Debug, Clone)]
pub struct SocketEnvelope {
    pub stream_id: String,
    pub instance: u64,
    pub connection: u64,
    pub event: SocketEvent,
}

/// Where a connection delivers its events
#[derive(Debug, Clone)]
pub struct SocketSink {
    stream_id: String,
    instance: u64,
    connection: u64,
    events: mpsc::UnboundedSender<SocketEnvelope>,
}

impl SocketSink {
    pub fn new(
        stream_id: impl Into<String>,
        instance: u64,
        connection: u64,
        events: mpsc::UnboundedSender<SocketEnvelope>,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            instance,
            connection,
            events,
        }
    }

    pub fn connection(&self) -> u64 {
        self.connection
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Deliver an event; `false` once the worker is gone
    pub fn emit(&self, event: SocketEvent) -> bool {
        self.events
            .send(SocketEnvelope {
                stream_id: self.stream_id.clone(),
                instance: self.instance,
                connection: self.connection,
                event,
            })
            .is_ok()
    }
}

/// Owner's handle to an open connection; closes it on drop
#[derive(Debug)]
pub struct SocketHandle {
    connection: u64,
    cancel: CancellationToken,
}

impl SocketHandle {
    pub fn new(connection: u64, cancel: CancellationToken) -> Self {
        Self { connection, cancel }
    }

    pub fn connection(&self) -> u64 {
        self.connection
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens stream sockets
pub trait Connector: Send + Sync {
    fn open(&self, url: &str, sink: SocketSink) -> SocketHandle;
}

/// WebSocket connector; binary messages carry frames, text messages control
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, url: &str, sink: SocketSink) -> SocketHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let url = url.to_owned();
        let connection = sink.connection();

        tokio::spawn(async move {
            let connected = tokio::select! {
                _ = token.cancelled() => return,
                result = connect_async(url.as_str()) => result,
            };

            let mut ws = match connected {
                Ok((ws, _response)) => ws,
                Err(e) => {
                    warn!(stream_id = %sink.stream_id(), "WebSocket connect to {} failed: {}", url, e);
                    sink.emit(SocketEvent::Error(
                        NetworkError::ConnectionFailed(e.to_string()).to_string(),
                    ));
                    sink.emit(SocketEvent::Closed);
                    return;
                }
            };

            if !sink.emit(SocketEvent::Opened) {
                return;
            }

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        if let Err(e) = SinkExt::close(&mut ws).await {
                            debug!(stream_id = %sink.stream_id(), "WebSocket close failed: {}", e);
                        }
                        break;
                    }
                    message = ws.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            sink.emit(SocketEvent::Message(SocketMessage::Text(text.as_str().to_owned())));
                        }
                        Some(Ok(Message::Binary(data))) => {
                            sink.emit(SocketEvent::Message(SocketMessage::Binary(Bytes::from(data))));
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            sink.emit(SocketEvent::Error(
                                NetworkError::ReceiveFailed(e.to_string()).to_string(),
                            ));
                            break;
                        }
                    }
                }
            }

            sink.emit(SocketEvent::Closed);
        });

        SocketHandle::new(connection, cancel)
    }
}
