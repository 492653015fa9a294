//! Error types for the media ingestion worker

use thiserror::Error;

/// Main error type for the worker
#[derive(Error, Debug)]
pub enum Error {
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors decoding traffic received on a stream socket
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Binary frame too short: {0} bytes")]
    Truncated(usize),

    #[error("Malformed control message: {0}")]
    MalformedControl(String),
}

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("Decoder configuration failed: {0}")]
    Configure(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Cannot call decode on an unconfigured codec")]
    Unconfigured,

    #[error("A key frame is required after configure or reset")]
    KeyFrameRequired,

    #[error("Cannot use a closed codec")]
    Closed,

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
}

impl CodecError {
    /// Whether this failure means the decoder lost its configuration
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, CodecError::Unconfigured)
    }

    /// Whether the chunk was refused without harming the codec
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::KeyFrameRequired)
    }
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Stream lifecycle errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Invalid media URL: {0}")]
    InvalidMediaUrl(String),

    #[error("Stream not found: {0}")]
    NotFound(String),

    #[error("Worker is no longer running")]
    WorkerGone,
}

/// Result type alias for the worker
pub type Result<T> = std::result::Result<T, Error>;
