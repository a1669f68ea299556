//! Length-prefixed framing for the chat transport.
//!
//! ## Frame format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! |     length (u32, big-endian)      |  payload  |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! The length counts payload bytes only. The payload is a UTF-8 JSON [`WireMessage`].
//! Frames may be split across reads or coalesced into one read; the decoder buffers
//! until a whole frame is available. A declared length above the configured maximum is
//! rejected before any payload is buffered.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::dto::wire::WireMessage;

/// Default maximum payload size (64 KiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Size of the length prefix in bytes.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Errors while framing or unframing. Always fatal to the session.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame of {length} bytes exceeds the maximum of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl FramingError {
    /// `true` when the underlying transport failed rather than the peer's data.
    pub fn is_transport(&self) -> bool {
        matches!(self, FramingError::Io(_))
    }
}

/// Serialize a message into a frame payload (without the length prefix).
pub fn encode_payload(message: &WireMessage) -> Result<Bytes, FramingError> {
    Ok(Bytes::from(serde_json::to_vec(message)?))
}

/// tokio-util codec for length-prefixed JSON frames.
///
/// Decodes into [`WireMessage`]; encodes either a [`WireMessage`] or an already
/// serialized payload ([`Bytes`]), so a broadcast is serialized once and shared by
/// every recipient.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn check_length(&self, length: usize) -> Result<(), FramingError> {
        if length > self.max_frame_size || length > u32::MAX as usize {
            return Err(FramingError::FrameTooLarge {
                length,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = WireMessage;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        self.check_length(length)?;

        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(length);

        let message = serde_json::from_slice(&payload)?;
        Ok(Some(message))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FramingError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.check_length(payload.len())?;

        dst.reserve(LENGTH_FIELD_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);
        Ok(())
    }
}

impl Encoder<WireMessage> for FrameCodec {
    type Error = FramingError;

    fn encode(&mut self, item: WireMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = encode_payload(&item)?;
        Encoder::<Bytes>::encode(self, payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(codec: &mut FrameCodec, message: WireMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        codec.encode(message, &mut buf).unwrap();
        buf
    }

    fn all_kinds() -> Vec<WireMessage> {
        vec![
            WireMessage::Join {
                display_name: "alice".to_string(),
            },
            WireMessage::Chat {
                display_name: "alice".to_string(),
                body: "hi".to_string(),
                timestamp: 1_700_000_000_000,
            },
            WireMessage::System {
                body: "bob has joined the chat".to_string(),
                timestamp: 1_700_000_000_001,
            },
            WireMessage::Ping,
            WireMessage::Pong,
            WireMessage::Disconnect,
        ]
    }

    #[test]
    fn test_round_trip_every_kind() {
        // テスト項目: 全てのメッセージ種別がエンコード→デコードで元に戻る
        // given (前提条件):
        let mut codec = FrameCodec::new();

        for message in all_kinds() {
            // when (操作):
            let mut buf = encode(&mut codec, message.clone());
            let decoded = codec.decode(&mut buf).unwrap();

            // then (期待する結果):
            assert_eq!(decoded, Some(message));
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_body_containing_length_prefix_bytes() {
        // テスト項目: 長さプレフィックスと同じバイト列を本文に含んでもフレームが壊れない
        // given (前提条件):
        let mut codec = FrameCodec::new();
        let tricky = WireMessage::Chat {
            display_name: "mallory".to_string(),
            body: "\u{0}\u{0}\u{0}\u{5}{\"type\":\"ping\"}".to_string(),
            timestamp: 42,
        };
        let mut buf = encode(&mut codec, tricky.clone());
        buf.extend_from_slice(&encode(&mut codec, WireMessage::Pong));

        // when (操作):
        let first = codec.decode(&mut buf).unwrap();
        let second = codec.decode(&mut buf).unwrap();

        // then (期待する結果):
        assert_eq!(first, Some(tricky));
        assert_eq!(second, Some(WireMessage::Pong));
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        // テスト項目: フレームが複数回の読み込みに分割されても正しくデコードされる
        // given (前提条件):
        let mut codec = FrameCodec::new();
        let message = WireMessage::Join {
            display_name: "bob".to_string(),
        };
        let full = encode(&mut codec, message.clone());
        let mut buf = BytesMut::new();

        // when (操作):
        buf.extend_from_slice(&full[..2]);
        let after_two = codec.decode(&mut buf).unwrap();
        buf.extend_from_slice(&full[2..7]);
        let after_seven = codec.decode(&mut buf).unwrap();
        buf.extend_from_slice(&full[7..]);
        let complete = codec.decode(&mut buf).unwrap();

        // then (期待する結果):
        assert_eq!(after_two, None);
        assert_eq!(after_seven, None);
        assert_eq!(complete, Some(message));
    }

    #[test]
    fn test_coalesced_frames_decode_in_order() {
        // テスト項目: 1 回の読み込みに複数フレームが含まれても順番通りにデコードされる
        // given (前提条件):
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        for message in all_kinds() {
            buf.extend_from_slice(&encode(&mut codec, message));
        }

        // when (操作):
        let mut decoded = Vec::new();
        while let Some(message) = codec.decode(&mut buf).unwrap() {
            decoded.push(message);
        }

        // then (期待する結果):
        assert_eq!(decoded, all_kinds());
    }

    #[test]
    fn test_oversized_length_prefix_is_rejected() {
        // テスト項目: 最大サイズを超える長さプレフィックスはペイロードを待たずにエラーになる
        // given (前提条件):
        let mut codec = FrameCodec::with_max_size(16);
        let mut buf = BytesMut::new();
        buf.put_u32(17);

        // when (操作):
        let result = codec.decode(&mut buf);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(FramingError::FrameTooLarge { length: 17, max: 16 })
        ));
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        // テスト項目: 不正な JSON やメッセージ種別に合わないフィールドはエラーになる
        // given (前提条件):
        let mut codec = FrameCodec::new();
        let mut not_json = BytesMut::new();
        codec
            .encode(Bytes::from_static(b"not json"), &mut not_json)
            .unwrap();
        let mut missing_field = BytesMut::new();
        codec
            .encode(Bytes::from_static(br#"{"type":"join"}"#), &mut missing_field)
            .unwrap();

        // when (操作):
        let first = codec.decode(&mut not_json);
        let second = codec.decode(&mut missing_field);

        // then (期待する結果):
        assert!(matches!(first, Err(FramingError::MalformedPayload(_))));
        assert!(matches!(second, Err(FramingError::MalformedPayload(_))));
    }

    #[test]
    fn test_encoder_rejects_oversized_payload() {
        // テスト項目: 最大サイズを超えるペイロードはエンコード時にエラーになる
        // given (前提条件):
        let mut codec = FrameCodec::with_max_size(8);
        let mut buf = BytesMut::new();

        // when (操作):
        let result = codec.encode(Bytes::from(vec![b'x'; 9]), &mut buf);

        // then (期待する結果):
        assert!(matches!(result, Err(FramingError::FrameTooLarge { .. })));
        assert!(buf.is_empty());
    }
}
