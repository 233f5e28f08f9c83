use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::head::{decode_request_head, decode_response_head, RequestHead, ResponseHead};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads heads, buffered bodies, and chunks from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete units.
/// Bytes read past the end of one unit stay buffered for the next, so a
/// head and the body that follows it must go through the same reader.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    finished: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            finished: false,
        }
    }

    /// Read a complete request head (blocking).
    pub fn read_request_head(&mut self) -> Result<RequestHead> {
        loop {
            if let Some(head) = decode_request_head(&mut self.buf, self.config.max_head_size)? {
                return Ok(head);
            }
            self.fill()?;
        }
    }

    /// Read a complete response head (blocking).
    pub fn read_response_head(&mut self) -> Result<ResponseHead> {
        loop {
            if let Some(head) = decode_response_head(&mut self.buf, self.config.max_head_size)? {
                return Ok(head);
            }
            self.fill()?;
        }
    }

    /// Read exactly `len` body bytes (blocking).
    pub fn read_body(&mut self, len: usize) -> Result<Bytes> {
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        while self.buf.len() < len {
            self.fill()?;
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Read the next chunk (blocking).
    ///
    /// Returns `Ok(None)` once the terminator has been read, and on every
    /// call after that. Returns `Err(FrameError::ConnectionClosed)` if the
    /// stream ends before the terminator.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                if frame.is_terminator() {
                    trace!("chunked stream terminated");
                    self.finished = true;
                    return Ok(None);
                }
                return Ok(Some(frame));
            }
            self.fill()?;
        }
    }

    /// Whether the terminator has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(());
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
