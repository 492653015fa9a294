//! Network subsystem for per-stream media sockets

pub mod socket;

pub use socket::{
    Connector, SocketEnvelope, SocketEvent, SocketHandle, SocketMessage, SocketSink, WsConnector,
};
