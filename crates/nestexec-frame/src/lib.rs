//! Chunked frame transport for nestexec.
//!
//! Streams are carried as HTTP/1.1 chunked bodies. Every frame is encoded as:
//! - the payload length in uppercase hex, followed by CRLF
//! - the payload bytes, followed by CRLF
//!
//! A zero-length frame (`0\r\n\r\n`) terminates the logical stream. The
//! reader and writer in this crate also handle the request/response heads
//! that precede a body, so a connection is consumed through a single
//! buffered [`FrameReader`] from the first byte to the last.

pub mod codec;
pub mod error;
pub mod head;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, encode_terminator, Frame, FrameConfig, DEFAULT_MAX_HEAD,
    DEFAULT_MAX_PAYLOAD, TERMINATOR,
};
pub use error::{FrameError, Result};
pub use head::{
    decode_request_head, decode_response_head, status_reason, BodyFraming, Headers, RequestHead,
    ResponseHead, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING,
};
pub use reader::FrameReader;
pub use writer::FrameWriter;
