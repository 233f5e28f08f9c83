//! HTTP/1.1 request and response heads.
//!
//! Only what the nestexec protocol needs: a request line or status line,
//! ordered headers, and the body framing implied by `content-length` /
//! `transfer-encoding`. Heads are parsed with `httparse`.

use std::fmt::Write as _;

use bytes::{Buf, BufMut, BytesMut};

use crate::codec::CRLF;
use crate::error::{FrameError, Result};

const HTTP_VERSION: &str = "HTTP/1.1";

pub const CONTENT_LENGTH: &str = "content-length";
pub const CONTENT_TYPE: &str = "content-type";
pub const TRANSFER_ENCODING: &str = "transfer-encoding";
pub const CONNECTION: &str = "connection";

/// Most headers accepted in one head.
const MAX_HEADERS: usize = 32;

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header. Duplicate names are kept in order.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// How the body following these headers is delimited.
    ///
    /// `transfer-encoding: chunked` wins over `content-length`; a head with
    /// neither (or a zero length) has no body.
    pub fn framing(&self) -> Result<BodyFraming> {
        if let Some(encoding) = self.get(TRANSFER_ENCODING) {
            if encoding
                .split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
            {
                return Ok(BodyFraming::Chunked);
            }
        }

        match self.get(CONTENT_LENGTH) {
            None => Ok(BodyFraming::Empty),
            Some(raw) => {
                let len: usize = raw.trim().parse().map_err(|_| {
                    FrameError::MalformedHead(format!("invalid content-length: {raw}"))
                })?;
                if len == 0 {
                    Ok(BodyFraming::Empty)
                } else {
                    Ok(BodyFraming::Length(len))
                }
            }
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        for (name, value) in &self.entries {
            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(CRLF);
        }
        dst.put_slice(CRLF);
    }
}

/// How a message body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body follows the head.
    Empty,
    /// Exactly this many bytes follow the head.
    Length(usize),
    /// A sequence of chunks ended by the terminator follows the head.
    Chunked,
}

/// A parsed or to-be-sent request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub headers: Headers,
}

impl RequestHead {
    /// A `POST` request head with no headers yet.
    pub fn post(target: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            target: target.into(),
            headers: Headers::new(),
        }
    }

    /// Builder-style header append.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn framing(&self) -> Result<BodyFraming> {
        self.headers.framing()
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let mut line = String::new();
        let _ = write!(line, "{} {} {HTTP_VERSION}", self.method, self.target);
        dst.put_slice(line.as_bytes());
        dst.put_slice(CRLF);
        self.headers.encode(dst);
    }
}

/// A parsed or to-be-sent response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
}

impl ResponseHead {
    /// A response head with the canonical reason phrase for `status`.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: status_reason(status).to_string(),
            headers: Headers::new(),
        }
    }

    /// Builder-style header append.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn framing(&self) -> Result<BodyFraming> {
        self.headers.framing()
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let mut line = String::new();
        let _ = write!(line, "{HTTP_VERSION} {} {}", self.status, self.reason);
        dst.put_slice(line.as_bytes());
        dst.put_slice(CRLF);
        self.headers.encode(dst);
    }
}

/// Reason phrase for the status codes this protocol uses.
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Decode a request head from a buffer.
///
/// Returns `Ok(None)` until the blank line ending the head has arrived.
pub fn decode_request_head(src: &mut BytesMut, max_head: usize) -> Result<Option<RequestHead>> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut slots);
    let status = request.parse(&src[..]).map_err(malformed)?;
    let Some(len) = complete_len(status, src.len(), max_head)? else {
        return Ok(None);
    };

    let head = RequestHead {
        method: request.method.unwrap_or_default().to_string(),
        target: request.path.unwrap_or_default().to_string(),
        headers: collect_headers(request.headers)?,
    };
    src.advance(len);
    Ok(Some(head))
}

/// Decode a response head from a buffer.
///
/// Returns `Ok(None)` until the blank line ending the head has arrived.
pub fn decode_response_head(src: &mut BytesMut, max_head: usize) -> Result<Option<ResponseHead>> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut slots);
    let status = response.parse(&src[..]).map_err(malformed)?;
    let Some(len) = complete_len(status, src.len(), max_head)? else {
        return Ok(None);
    };

    let code = response
        .code
        .ok_or_else(|| FrameError::MalformedHead("missing status code".to_string()))?;
    let head = ResponseHead {
        status: code,
        reason: response.reason.unwrap_or_default().to_string(),
        headers: collect_headers(response.headers)?,
    };
    src.advance(len);
    Ok(Some(head))
}

/// Head length once parsing completed, enforcing `max_head` either way.
fn complete_len(
    status: httparse::Status<usize>,
    buffered: usize,
    max_head: usize,
) -> Result<Option<usize>> {
    match status {
        httparse::Status::Complete(len) if len > max_head => {
            Err(FrameError::HeadTooLarge { max: max_head })
        }
        httparse::Status::Complete(len) => Ok(Some(len)),
        httparse::Status::Partial if buffered > max_head => {
            Err(FrameError::HeadTooLarge { max: max_head })
        }
        httparse::Status::Partial => Ok(None),
    }
}

fn collect_headers(parsed: &[httparse::Header<'_>]) -> Result<Headers> {
    let mut headers = Headers::new();
    for header in parsed {
        let value = std::str::from_utf8(header.value).map_err(|_| {
            FrameError::MalformedHead(format!("header {} is not valid utf-8", header.name))
        })?;
        headers.insert(header.name, value.trim());
    }
    Ok(headers)
}

fn malformed(err: httparse::Error) -> FrameError {
    FrameError::MalformedHead(err.to_string())
}
