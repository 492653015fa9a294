//! Binary frame format carried on each stream socket.
//!
//! Layout: `[timestamp: u32 BE][frame type: u8][payload ...]`

use bytes::{Buf, Bytes};

use crate::constants::{
    FRAME_HEADER_LEN, FRAME_TYPE_AUDIO, FRAME_TYPE_CONFIG, FRAME_TYPE_DELTA, FRAME_TYPE_KEY,
};
use crate::error::WireError;

/// Type of a binary frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Video key frame
    Key,
    /// Video delta frame
    Delta,
    /// Audio frame
    Audio,
    /// In-band configuration (not expected from the server)
    Config,
    /// Any other code
    Unknown(u8),
}

impl FrameType {
    pub fn from_code(code: u8) -> Self {
        match code {
            FRAME_TYPE_KEY => FrameType::Key,
            FRAME_TYPE_DELTA => FrameType::Delta,
            FRAME_TYPE_AUDIO => FrameType::Audio,
            FRAME_TYPE_CONFIG => FrameType::Config,
            other => FrameType::Unknown(other),
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, FrameType::Key | FrameType::Delta)
    }
}

/// One parsed frame off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Timestamp in socket-native units (milliseconds)
    pub timestamp: u32,
    pub frame_type: FrameType,
    pub payload: Bytes,
}

/// Parse a binary socket message into a frame record.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] when the message is shorter than the
/// 5-byte header.
pub fn parse_frame(mut data: Bytes) -> Result<FrameRecord, WireError> {
    if data.len() < FRAME_HEADER_LEN {
        return Err(WireError::Truncated(data.len()));
    }

    let timestamp = data.get_u32();
    let frame_type = FrameType::from_code(data.get_u8());

    Ok(FrameRecord {
        timestamp,
        frame_type,
        payload: data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_frame() {
        let data = Bytes::from_static(&[0x00, 0x00, 0x03, 0xE8, 0x00, 0xAA, 0xBB]);
        let frame = parse_frame(data).unwrap();

        assert_eq!(frame.timestamp, 1000);
        assert_eq!(frame.frame_type, FrameType::Key);
        assert_eq!(&frame.payload[..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_frame_type_codes() {
        assert_eq!(FrameType::from_code(1), FrameType::Delta);
        assert_eq!(FrameType::from_code(2), FrameType::Audio);
        assert_eq!(FrameType::from_code(3), FrameType::Config);
        assert_eq!(FrameType::from_code(9), FrameType::Unknown(9));
        assert!(FrameType::Delta.is_video());
        assert!(!FrameType::Audio.is_video());
    }

    #[test]
    fn test_header_only_frame_has_empty_payload() {
        let frame = parse_frame(Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 2])).unwrap();
        assert_eq!(frame.timestamp, u32::MAX);
        assert_eq!(frame.frame_type, FrameType::Audio);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_short_frame_rejected() {
        let err = parse_frame(Bytes::from_static(&[0, 0, 1])).unwrap_err();
        assert!(matches!(err, WireError::Truncated(3)));
    }
}
