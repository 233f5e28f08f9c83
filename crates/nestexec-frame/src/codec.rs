use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Line delimiter used by both heads and chunks.
pub const CRLF: &[u8] = b"\r\n";

/// The zero-length chunk that ends a chunked body.
pub const TERMINATOR: &[u8] = b"0\r\n\r\n";

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Default maximum head size: 16 KiB.
pub const DEFAULT_MAX_HEAD: usize = 16 * 1024;

/// Longest accepted chunk length line, excluding its CRLF.
const MAX_LENGTH_LINE: usize = 64;

/// One chunk of a chunked body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The chunk payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// An empty chunk is indistinguishable from the stream terminator.
    pub fn is_terminator(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Encode a payload as one chunk.
///
/// Wire format:
/// ```text
/// <LEN as uppercase hex>\r\n<payload>\r\n
/// ```
///
/// An empty payload produces the terminator bytes `0\r\n\r\n`.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    let length_line = format!("{:X}", payload.len());
    dst.reserve(length_line.len() + payload.len() + 2 * CRLF.len());
    dst.put_slice(length_line.as_bytes());
    dst.put_slice(CRLF);
    dst.put_slice(payload);
    dst.put_slice(CRLF);
}

/// Encode the end-of-stream terminator.
pub fn encode_terminator(dst: &mut BytesMut) {
    dst.put_slice(TERMINATOR);
}

/// Decode one chunk from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete chunk yet.
/// On success, consumes the chunk bytes from the buffer. Chunk extensions
/// (`;name=value` after the length) are accepted and ignored.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let window = src.len().min(MAX_LENGTH_LINE + CRLF.len());
    let Some(line_end) = find_crlf(&src[..window]) else {
        if src.len() > MAX_LENGTH_LINE {
            return Err(FrameError::MalformedLength(format!(
                "no CRLF within {MAX_LENGTH_LINE} bytes"
            )));
        }
        return Ok(None); // Need more data
    };

    let payload_len = parse_length_line(&src[..line_end])?;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let payload_start = line_end + CRLF.len();
    let total = payload_start + payload_len + CRLF.len();
    if src.len() < total {
        return Ok(None); // Need more data
    }

    if &src[payload_start + payload_len..total] != CRLF {
        return Err(FrameError::MissingDelimiter);
    }

    src.advance(payload_start);
    let payload = src.split_to(payload_len).freeze();
    src.advance(CRLF.len());

    Ok(Some(Frame { payload }))
}

fn parse_length_line(line: &[u8]) -> Result<usize> {
    let digits = match line.iter().position(|b| *b == b';') {
        Some(ext) => &line[..ext],
        None => line,
    };
    let digits = digits.trim_ascii();

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(FrameError::MalformedLength(
            String::from_utf8_lossy(line).into_owned(),
        ));
    }

    // Safe to view as str: every byte is an ASCII hex digit.
    let text = std::str::from_utf8(digits)
        .map_err(|_| FrameError::MalformedLength(String::from_utf8_lossy(line).into_owned()))?;
    usize::from_str_radix(text, 16)
        .map_err(|err| FrameError::MalformedLength(format!("{text}: {err}")))
}

pub(crate) fn find_crlf(haystack: &[u8]) -> Option<usize> {
    haystack.windows(CRLF.len()).position(|w| w == CRLF)
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum chunk or buffered body size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Maximum request/response head size in bytes. Default: 16 KiB.
    pub max_head_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_head_size: DEFAULT_MAX_HEAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::new();
        encode_frame(payload, &mut buf);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(buf.is_empty());
        frame.payload
    }

    #[test]
    fn test_encode_wire_format() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello, nestexec!", &mut buf);
        assert_eq!(buf.as_ref(), b"10\r\nhello, nestexec!\r\n");
    }

    #[test]
    fn test_roundtrip_assorted_payloads() {
        let binary: Vec<u8> = (0..=255u8).collect();
        let large = vec![0x5A; 70_000];
        for payload in [
            &b""[..],
            b"x",
            b"\r\n",
            b"0\r\n\r\n",
            binary.as_slice(),
            large.as_slice(),
        ] {
            assert_eq!(roundtrip(payload).as_ref(), payload);
        }
    }

    #[test]
    fn test_empty_payload_is_terminator() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf);
        assert_eq!(buf.as_ref(), TERMINATOR);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(frame.is_terminator());
    }

    #[test]
    fn test_decode_incomplete_length_line() {
        let mut buf = BytesMut::from(&b"1F"[..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf);
        buf.truncate(buf.len() - 3);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_lowercase_hex_and_extension() {
        let mut buf = BytesMut::from(&b"a;name=value\r\n0123456789\r\n"[..]);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload.as_ref(), b"0123456789");
    }

    #[test]
    fn test_decode_rejects_non_hex_length() {
        for line in [&b"zz\r\n"[..], b"\r\n", b"+5\r\n", b"-1\r\n"] {
            let mut buf = BytesMut::from(line);
            let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
            assert!(
                matches!(result, Err(FrameError::MalformedLength(_))),
                "line {line:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_decode_rejects_endless_length_line() {
        let mut buf = BytesMut::from(vec![b'1'; MAX_LENGTH_LINE + 8].as_slice());
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::MalformedLength(_))));
    }

    #[test]
    fn test_decode_rejects_overflowing_length() {
        let mut buf = BytesMut::from(&b"FFFFFFFFFFFFFFFFFFFF\r\n"[..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::MalformedLength(_))));
    }

    #[test]
    fn test_decode_missing_trailing_crlf() {
        let mut buf = BytesMut::from(&b"3\r\nabcXY"[..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::MissingDelimiter)));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::from(&b"2000000\r\n"[..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames_then_terminator() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf);
        encode_frame(b"second", &mut buf);
        encode_terminator(&mut buf);

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f2.payload.as_ref(), b"second");

        let end = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(end.is_terminator());
        assert!(buf.is_empty());
    }
}
