//! Fixed-header framing for script execution payloads.
//!
//! Frame format (integers little-endian):
//! ```text
//! +--------+----------+-------------+----------+----------+------+
//! | 1 byte | 7 bytes  | 4 bytes     | 4 bytes  | N bytes  | 1 B  |
//! | opcode | reserved | length (LE) | reserved | UTF-8    | 0x00 |
//! +--------+----------+-------------+----------+----------+------+
//! ```
//!
//! The length field counts the payload plus its trailing NUL terminator,
//! so an empty script encodes to a 17-byte frame with a length of 1.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Opcode of the only frame kind: execute a script.
pub const OPCODE_EXECUTE: u8 = 0;

/// Fixed header size preceding the payload.
pub const HEADER_LEN: usize = 16;

/// Byte offset of the length field within the header.
const LENGTH_OFFSET: usize = 8;

/// Maximum script payload size accepted by the decoder (16 MB)
const MAX_SCRIPT_SIZE: usize = 16 * 1024 * 1024;

/// Encode a script into a single execute frame.
///
/// Infallible for any input: the payload is passed through without
/// validation (embedded NUL bytes included), and the result is always
/// `HEADER_LEN + script.len() + 1` bytes.
// Scripts beyond u32 range are rejected by the codec path; the raw helper
// mirrors the sender contract, which never sees them.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn encode_script(script: &str) -> Bytes {
    let payload = script.as_bytes();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len() + 1);

    buf.put_u8(OPCODE_EXECUTE);
    buf.put_bytes(0, LENGTH_OFFSET - 1);
    buf.put_u32_le(payload.len() as u32 + 1);
    buf.put_bytes(0, HEADER_LEN - LENGTH_OFFSET - 4);
    buf.put_slice(payload);
    buf.put_u8(0);

    buf.freeze()
}

/// Codec for execute frames over a stream socket.
///
/// The sender side of the protocol only encodes; the decoder exists for
/// the receiving half (mock targets, tests).
#[derive(Debug, Default)]
pub struct ScriptCodec {
    current_length: Option<usize>,
}

impl ScriptCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ScriptCodec {
    type Item = String;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.current_length.is_none() {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }

            let opcode = src[0];
            if opcode != OPCODE_EXECUTE {
                return Err(FrameError::UnknownOpcode(opcode));
            }

            let len = u32::from_le_bytes([
                src[LENGTH_OFFSET],
                src[LENGTH_OFFSET + 1],
                src[LENGTH_OFFSET + 2],
                src[LENGTH_OFFSET + 3],
            ]) as usize;

            // The length always counts the terminator.
            if len == 0 {
                return Err(FrameError::BadLength);
            }

            if len - 1 > MAX_SCRIPT_SIZE {
                return Err(FrameError::ScriptTooLarge(len - 1));
            }

            src.advance(HEADER_LEN);
            self.current_length = Some(len);
        }

        let Some(length) = self.current_length else {
            return Ok(None);
        };

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let mut payload = src.split_to(length);
        self.current_length = None;

        let terminator = payload.split_off(length - 1);
        if terminator[0] != 0 {
            return Err(FrameError::MissingTerminator);
        }

        let script = std::str::from_utf8(&payload)?;
        Ok(Some(script.to_string()))
    }
}

impl Encoder<String> for ScriptCodec {
    type Error = FrameError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_SCRIPT_SIZE {
            return Err(FrameError::ScriptTooLarge(item.len()));
        }

        dst.extend_from_slice(&encode_script(&item));
        Ok(())
    }
}

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),

    #[error("length field does not cover the terminator")]
    BadLength,

    #[error("script too large: {0} bytes (max: {MAX_SCRIPT_SIZE})")]
    ScriptTooLarge(usize),

    #[error("frame missing NUL terminator")]
    MissingTerminator,

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(bytes: &[u8]) -> Option<String> {
        let mut codec = ScriptCodec::new();
        let mut buf = BytesMut::from(bytes);
        codec.decode(&mut buf).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode_script("hi");

        assert_eq!(frame.len(), HEADER_LEN + 2 + 1);
        assert_eq!(frame[0], OPCODE_EXECUTE);
        assert_eq!(&frame[1..8], &[0u8; 7]);
        // Length field counts payload + terminator, little-endian.
        assert_eq!(&frame[8..12], &3u32.to_le_bytes());
        assert_eq!(&frame[12..16], &[0u8; 4]);
        assert_eq!(&frame[16..18], b"hi");
        assert_eq!(frame[18], 0x00);
    }

    #[test]
    fn test_encode_empty_script() {
        let frame = encode_script("");

        assert_eq!(frame.len(), 17);
        assert_eq!(&frame[8..12], &1u32.to_le_bytes());
        assert_eq!(frame[16], 0x00);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let script = "print('hello from scriptcast')";
        let decoded = decode_one(&encode_script(script));
        assert_eq!(decoded.as_deref(), Some(script));
    }

    #[test]
    fn test_roundtrip_empty() {
        assert_eq!(decode_one(&encode_script("")).as_deref(), Some(""));
    }

    #[test]
    fn test_roundtrip_multibyte_utf8() {
        let script = "print(\"héllo wörld 🚀\")";
        let frame = encode_script(script);
        assert_eq!(frame.len(), HEADER_LEN + script.len() + 1);
        assert_eq!(decode_one(&frame).as_deref(), Some(script));
    }

    #[test]
    fn test_roundtrip_embedded_nul() {
        // No escaping: an interior NUL passes through untouched and only
        // the final byte acts as terminator.
        let script = "a\0b";
        assert_eq!(decode_one(&encode_script(script)).as_deref(), Some(script));
    }

    #[test]
    fn test_decode_empty_buffer() {
        let mut codec = ScriptCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_partial_decode() {
        let mut codec = ScriptCodec::new();
        let frame = encode_script("fragmented");

        // Half a header is not enough.
        let mut buf = BytesMut::from(&frame[..7]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // Full header but truncated payload.
        buf.extend_from_slice(&frame[7..HEADER_LEN + 4]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // Remainder completes the frame.
        buf.extend_from_slice(&frame[HEADER_LEN + 4..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("fragmented"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut codec = ScriptCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_script("first"));
        buf.extend_from_slice(&encode_script("second"));

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("first"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("second"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let mut frame = BytesMut::from(&encode_script("x")[..]);
        frame[0] = 7;

        let mut codec = ScriptCodec::new();
        let result = codec.decode(&mut frame);
        assert!(matches!(result, Err(FrameError::UnknownOpcode(7))));
    }

    #[test]
    fn test_decode_zero_length() {
        let mut frame = BytesMut::zeroed(HEADER_LEN);
        frame[0] = OPCODE_EXECUTE;

        let mut codec = ScriptCodec::new();
        let result = codec.decode(&mut frame);
        assert!(matches!(result, Err(FrameError::BadLength)));
    }

    // Length fields in tests are small constants bounded to u32
    #[allow(clippy::cast_possible_truncation)]
    #[test]
    fn test_decode_oversized_length() {
        let mut frame = BytesMut::zeroed(HEADER_LEN);
        frame[0] = OPCODE_EXECUTE;
        frame[8..12].copy_from_slice(&((MAX_SCRIPT_SIZE as u32) + 2).to_le_bytes());

        let mut codec = ScriptCodec::new();
        let result = codec.decode(&mut frame);
        assert!(matches!(result, Err(FrameError::ScriptTooLarge(_))));
    }

    #[test]
    fn test_decode_missing_terminator() {
        let mut frame = BytesMut::from(&encode_script("x")[..]);
        let last = frame.len() - 1;
        frame[last] = b'!';

        let mut codec = ScriptCodec::new();
        let result = codec.decode(&mut frame);
        assert!(matches!(result, Err(FrameError::MissingTerminator)));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let mut frame = BytesMut::zeroed(HEADER_LEN);
        frame[0] = OPCODE_EXECUTE;
        frame[8..12].copy_from_slice(&3u32.to_le_bytes());
        frame.extend_from_slice(&[0xff, 0xfe, 0x00]);

        let mut codec = ScriptCodec::new();
        let result = codec.decode(&mut frame);
        assert!(matches!(result, Err(FrameError::Utf8(_))));
    }

    #[test]
    fn test_encoder_matches_helper() {
        let mut codec = ScriptCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("return 1".to_string(), &mut buf).unwrap();

        assert_eq!(&buf[..], &encode_script("return 1")[..]);
    }

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::UnknownOpcode(9);
        assert!(err.to_string().contains('9'));

        let err = FrameError::ScriptTooLarge(20_000_000);
        assert!(err.to_string().contains("20000000"));
        assert!(err.to_string().contains("too large"));

        let err = FrameError::MissingTerminator;
        assert!(err.to_string().contains("terminator"));
    }

    #[test]
    fn test_frame_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
        let err: FrameError = io_err.into();
        assert!(matches!(err, FrameError::Io(_)));
        assert!(err.to_string().contains("connection reset"));
    }
}
