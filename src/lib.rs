//! # Stream Ingest
//!
//! Per-stream live media ingestion: binary socket frames in, paced decoder
//! input, decoded video events and per-subscriber decoded audio out.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                         WORKER TASK (single context)                        │
//! │                                                                             │
//! │   Commands ──► StreamRegistry (streams::registry)                           │
//! │                 │                                                           │
//! │                 ├── Stream A                    ├── Stream B  ...           │
//! │                 │   ┌──────────────┐            │                           │
//! │   socket ───────┼──►│ WireFrame    │ text ──► control messages            │
//! │                 │   │ Codec        │                                        │
//! │                 │   └──────┬───────┘                                        │
//! │                 │          │ binary                                         │
//! │                 │          ▼                                                │
//! │                 │   ┌──────────────┐   ┌──────────────┐                     │
//! │                 │   │ Video Jitter │   │ Audio Jitter │                     │
//! │                 │   │ Buffer (60)  │   │ Buffer (46)  │                     │
//! │                 │   └──────┬───────┘   └──────┬───────┘                     │
//! │                 │          ▼                  ▼                             │
//! │                 │   ┌──────────────┐   ┌──────────────┐                     │
//! │                 │   │ Video Pacer  │   │ Audio Pacer  │  occupancy-driven   │
//! │                 │   └──────┬───────┘   └──────┬───────┘  tick period        │
//! │                 │          ▼                  ▼                             │
//! │                 │   ┌──────────────┐   ┌──────────────┐                     │
//! │                 │   │ Video Decoder│   │ Audio Decoder│  (Opus)             │
//! │                 │   └──────┬───────┘   └──────┬───────┘                     │
//! │                 │          │                  │                             │
//! └─────────────────┼──────────┼──────────────────┼─────────────────────────────┘
//!                   │          ▼                  ▼
//!                   │     videoData event    ChannelRouter ──► subscriber channel
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod media;
pub mod network;
pub mod protocol;
pub mod streams;
#[cfg(feature = "http-ui")]
pub mod ui;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use worker::{Command, Worker, WorkerEvent, WorkerHandle};

/// Application-wide constants
pub mod constants {
    /// Binary frame header: 4-byte timestamp + 1-byte frame type
    pub const FRAME_HEADER_LEN: usize = 5;

    /// Frame type code for a video key frame
    pub const FRAME_TYPE_KEY: u8 = 0;

    /// Frame type code for a video delta frame
    pub const FRAME_TYPE_DELTA: u8 = 1;

    /// Frame type code for an audio frame
    pub const FRAME_TYPE_AUDIO: u8 = 2;

    /// Frame type code reserved for in-band configuration
    pub const FRAME_TYPE_CONFIG: u8 = 3;

    /// Samples per channel carried by one audio unit
    pub const AUDIO_SAMPLES_PER_FRAME: u32 = 1024;

    /// Socket timestamps are milliseconds; decoders take microseconds
    pub const TIMESTAMP_SCALE_US: u64 = 1000;

    /// Default video jitter buffer capacity (frames)
    pub const VIDEO_BUFFER_CAPACITY: usize = 60;

    /// Default audio jitter buffer capacity (frames)
    pub const AUDIO_BUFFER_CAPACITY: usize = 46;

    /// Buffered video frames required before pacing starts
    pub const VIDEO_START_THRESHOLD: usize = 30;

    /// Buffered audio frames required before pacing starts
    pub const AUDIO_START_THRESHOLD: usize = 23;

    /// Default HTTP port for the command surface
    pub const DEFAULT_HTTP_PORT: u16 = 8080;
}
