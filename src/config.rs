//! Worker configuration loaded from TOML

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::constants::{
    AUDIO_BUFFER_CAPACITY, AUDIO_START_THRESHOLD, DEFAULT_HTTP_PORT, VIDEO_BUFFER_CAPACITY,
    VIDEO_START_THRESHOLD,
};
use crate::error::{Error, Result};
use crate::protocol::VideoDecoderConfig;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "MEDIA_WORKER_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub buffer: BufferConfig,
    pub worker: WorkerConfig,
    pub fallback_video: FallbackVideoConfig,
    pub ui: UiConfig,
    pub streams: Vec<BootStream>,
}

/// Jitter buffer caps and playback-start thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub video_capacity: usize,
    pub audio_capacity: usize,
    pub video_start_threshold: usize,
    pub audio_start_threshold: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            video_capacity: VIDEO_BUFFER_CAPACITY,
            audio_capacity: AUDIO_BUFFER_CAPACITY,
            video_start_threshold: VIDEO_START_THRESHOLD,
            audio_start_threshold: AUDIO_START_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Depth of the inbound command queue
    pub command_queue: usize,
    /// Depth of each decoded-audio channel created by the binary
    pub audio_port_capacity: usize,
    /// Seconds between stats log lines; 0 disables
    pub stats_interval_secs: u64,
    /// Pacing rate for video until `DecoderConfigs` arrives
    pub default_video_frame_rate: f64,
    /// Pacing sample rate for audio until `DecoderConfigs` arrives
    pub default_audio_sample_rate: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command_queue: 64,
            audio_port_capacity: 256,
            stats_interval_secs: 10,
            default_video_frame_rate: 60.0,
            default_audio_sample_rate: 48000,
        }
    }
}

/// Video configuration used when a closed decoder is recreated before the
/// stream announced its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackVideoConfig {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
    pub bitrate: u64,
    pub latency_mode: String,
    pub hevc_format: String,
    pub max_b_frames: u32,
}

impl Default for FallbackVideoConfig {
    fn default() -> Self {
        Self {
            codec: "hev1.1.0.L90.b0".to_string(),
            width: 1920,
            height: 1080,
            framerate: 60.0,
            bitrate: 4_000_000,
            latency_mode: "quality".to_string(),
            hevc_format: "annexb".to_string(),
            max_b_frames: 0,
        }
    }
}

impl FallbackVideoConfig {
    pub fn to_decoder_config(&self) -> VideoDecoderConfig {
        let mut extra = Map::new();
        extra.insert("bitrate".into(), Value::from(self.bitrate));
        extra.insert("latencyMode".into(), Value::from(self.latency_mode.clone()));
        extra.insert(
            "hevc".into(),
            json!({ "format": self.hevc_format, "maxBFrames": self.max_b_frames }),
        );

        VideoDecoderConfig {
            codec: self.codec.clone(),
            coded_width: Some(self.width),
            coded_height: Some(self.height),
            frame_rate: Some(self.framerate),
            description: None,
            extra,
        }
    }
}

/// HTTP command surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

impl UiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid UI address: {}", e)))
    }
}

/// A stream started at boot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootStream {
    pub subscriber_id: String,
    pub media_url: String,
}

impl AppConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, else `MEDIA_WORKER_CONFIG`, else the default location
    /// when it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "stream-ingest").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let buffer = &self.buffer;
        for (name, capacity, threshold) in [
            ("video", buffer.video_capacity, buffer.video_start_threshold),
            ("audio", buffer.audio_capacity, buffer.audio_start_threshold),
        ] {
            if capacity == 0 {
                return Err(Error::Config(format!("{} buffer capacity must be positive", name)));
            }
            if threshold > capacity {
                return Err(Error::Config(format!(
                    "{} start threshold {} exceeds capacity {}",
                    name, threshold, capacity
                )));
            }
        }

        if self.worker.command_queue == 0 || self.worker.audio_port_capacity == 0 {
            return Err(Error::Config("channel capacities must be positive".into()));
        }
        let rate = self.worker.default_video_frame_rate;
        if !(rate.is_finite() && rate > 0.0) || self.worker.default_audio_sample_rate == 0 {
            return Err(Error::Config("default media rates must be positive".into()));
        }
        Ok(())
    }
}
