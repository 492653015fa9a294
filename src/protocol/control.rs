//! JSON control messages carried in text frames.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::AUDIO_SAMPLES_PER_FRAME;
use crate::error::WireError;
use crate::protocol::wire::parse_frame;

/// Everything a text frame can carry, decoded at the socket boundary
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{type: "TotalViewerCount", total_viewers}`
    ViewerCount(u64),
    /// `{type: "DecoderConfigs", videoConfig, audioConfig}`
    DecoderConfigs(DecoderConfigs),
    /// A new publish session started upstream
    Publish,
    /// Keepalive
    Ping,
    /// Valid text we do not act on
    Unrecognized(String),
}

/// Video and audio decoder configuration announced by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoderConfigs {
    pub video_config: VideoDecoderConfig,
    pub audio_config: AudioDecoderConfig,
}

/// Video decoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDecoderConfig {
    pub codec: String,
    #[serde(default, alias = "width", skip_serializing_if = "Option::is_none")]
    pub coded_width: Option<u32>,
    #[serde(default, alias = "height", skip_serializing_if = "Option::is_none")]
    pub coded_height: Option<u32>,
    #[serde(default, alias = "framerate", skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    /// Codec-specific extradata, base64 on the wire
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub description: Option<Bytes>,
    /// Fields passed through to the codec untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Audio decoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDecoderConfig {
    pub codec: String,
    pub sample_rate: u32,
    pub number_of_channels: u16,
    /// Opening audio unit, base64 on the wire
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub description: Option<Bytes>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AudioDecoderConfig {
    /// Audio units per second (`sampleRate / 1024`)
    pub fn units_per_second(&self) -> f64 {
        f64::from(self.sample_rate) / f64::from(AUDIO_SAMPLES_PER_FRAME)
    }

    /// The audio unit embedded in `description`, used to prime the decoder.
    ///
    /// The descriptor shares the binary frame layout: a 4-byte big-endian
    /// timestamp, one type byte, then the payload.
    pub fn priming_unit(&self) -> Option<(u32, Bytes)> {
        let description = self.description.clone()?;
        parse_frame(description)
            .ok()
            .map(|frame| (frame.timestamp, frame.payload))
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum TaggedControl {
    TotalViewerCount { total_viewers: u64 },
    DecoderConfigs(DecoderConfigs),
}

/// Decode a text frame.
///
/// Bare `publish` / `ping` strings are accepted with or without JSON quoting.
///
/// # Errors
///
/// Returns [`WireError::MalformedControl`] when the text is not JSON, or when a
/// recognised `type` carries a body that does not match its schema.
pub fn decode_text(text: &str) -> Result<InboundMessage, WireError> {
    if let Some(keyword) = keyword(text.trim()) {
        return Ok(keyword);
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| WireError::MalformedControl(e.to_string()))?;

    let kind = match &value {
        Value::String(s) => {
            return Ok(keyword(s).unwrap_or_else(|| InboundMessage::Unrecognized(s.clone())))
        }
        Value::Object(map) => map.get("type").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    };

    match kind.as_deref() {
        Some("TotalViewerCount") | Some("DecoderConfigs") => {
            let tagged: TaggedControl = serde_json::from_value(value)
                .map_err(|e| WireError::MalformedControl(e.to_string()))?;
            Ok(match tagged {
                TaggedControl::TotalViewerCount { total_viewers } => {
                    InboundMessage::ViewerCount(total_viewers)
                }
                TaggedControl::DecoderConfigs(configs) => InboundMessage::DecoderConfigs(configs),
            })
        }
        Some(other) => Ok(InboundMessage::Unrecognized(other.to_owned())),
        None => Ok(InboundMessage::Unrecognized(text.to_owned())),
    }
}

fn keyword(text: &str) -> Option<InboundMessage> {
    match text {
        "publish" => Some(InboundMessage::Publish),
        "ping" => Some(InboundMessage::Ping),
        _ => None,
    }
}

/// Serde adapter for optional base64 byte fields
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Bytes>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| STANDARD.decode(s.trim()).map(Bytes::from))
            .transpose()
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIGS: &str = r#"{
        "type": "DecoderConfigs",
        "videoConfig": {
            "codec": "hev1.1.6.L93.B0",
            "codedWidth": 1280,
            "codedHeight": 720,
            "frameRate": 30,
            "description": "AAECAw==",
            "hardwareAcceleration": "prefer-hardware"
        },
        "audioConfig": {
            "codec": "opus",
            "sampleRate": 48000,
            "numberOfChannels": 2,
            "description": "AAAD6AL8//4="
        }
    }"#;

    #[test]
    fn test_decoder_configs() {
        let InboundMessage::DecoderConfigs(configs) = decode_text(CONFIGS).unwrap() else {
            panic!("expected DecoderConfigs");
        };

        let video = &configs.video_config;
        assert_eq!(video.codec, "hev1.1.6.L93.B0");
        assert_eq!(video.coded_width, Some(1280));
        assert_eq!(video.frame_rate, Some(30.0));
        assert_eq!(video.description.as_deref(), Some(&[0u8, 1, 2, 3][..]));
        assert_eq!(
            video.extra.get("hardwareAcceleration"),
            Some(&Value::from("prefer-hardware"))
        );

        let audio = &configs.audio_config;
        assert_eq!(audio.sample_rate, 48000);
        assert_eq!(audio.number_of_channels, 2);
        assert!((audio.units_per_second() - 46.875).abs() < 1e-9);
    }

    #[test]
    fn test_priming_unit_skips_header() {
        let InboundMessage::DecoderConfigs(configs) = decode_text(CONFIGS).unwrap() else {
            panic!("expected DecoderConfigs");
        };

        let (timestamp, data) = configs.audio_config.priming_unit().unwrap();
        assert_eq!(timestamp, 1000);
        assert_eq!(&data[..], &[0xFC, 0xFF, 0xFE]);
    }

    #[test]
    fn test_viewer_count() {
        let msg = decode_text(r#"{"type":"TotalViewerCount","total_viewers":12}"#).unwrap();
        assert_eq!(msg, InboundMessage::ViewerCount(12));
    }

    #[test]
    fn test_keywords_bare_and_quoted() {
        assert_eq!(decode_text("publish").unwrap(), InboundMessage::Publish);
        assert_eq!(decode_text("\"publish\"").unwrap(), InboundMessage::Publish);
        assert_eq!(decode_text("ping").unwrap(), InboundMessage::Ping);
        assert_eq!(decode_text("\"ping\"").unwrap(), InboundMessage::Ping);
    }

    #[test]
    fn test_unknown_type_is_unrecognized() {
        let msg = decode_text(r#"{"type":"Chat","text":"hi"}"#).unwrap();
        assert_eq!(msg, InboundMessage::Unrecognized("Chat".into()));
    }

    #[test]
    fn test_malformed_control() {
        assert!(matches!(
            decode_text("{not json"),
            Err(WireError::MalformedControl(_))
        ));
        assert!(matches!(
            decode_text(r#"{"type":"DecoderConfigs","videoConfig":{}}"#),
            Err(WireError::MalformedControl(_))
        ));
    }

    #[test]
    fn test_bad_base64_rejected() {
        let text = r#"{"type":"DecoderConfigs",
            "videoConfig":{"codec":"avc1","description":"%%%"},
            "audioConfig":{"codec":"opus","sampleRate":48000,"numberOfChannels":1}}"#;
        assert!(decode_text(text).is_err());
    }
}
