//! Codec trait and implementations for serializing/deserializing frames.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes. The
//! realtime adapter doesn't care HOW frames are serialized; it only needs
//! something that implements [`Codec`]. The session server speaks JSON, so
//! [`JsonCodec`] is the one implementation shipped today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the adapter's
/// long-running Tokio task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use pairup_protocol::{Codec, JsonCodec, ServerEvent};
///
/// let codec = JsonCodec;
///
/// let bytes = codec.encode(&ServerEvent::RoundReset {}).unwrap();
/// assert_eq!(bytes, br#"{"event":"round_reset","data":{}}"#);
///
/// let decoded: ServerEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ServerEvent::RoundReset {});
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::ServerEvent;

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<ServerEvent, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_decode_truncated_frame_returns_error() {
        let result: Result<ServerEvent, _> = JsonCodec.decode(br#"{"event":"student_removed""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_codec_encodes_student_removed_reason() {
        let event = ServerEvent::StudentRemoved {
            reason: "removed by instructor".into(),
        };
        let bytes = JsonCodec.encode(&event).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""reason":"removed by instructor""#));
    }
}
