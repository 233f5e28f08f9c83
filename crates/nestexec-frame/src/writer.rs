use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, encode_terminator, FrameConfig};
use crate::error::{FrameError, Result};
use crate::head::{RequestHead, ResponseHead};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes heads, buffered bodies, and chunks to any `Write` stream.
///
/// Every call writes one complete unit and flushes, so a frame is on the
/// wire by the time the call returns.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one chunk.
    ///
    /// An empty payload is the terminator; prefer [`Self::write_terminator`]
    /// to say so explicitly.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.check_size(payload.len())?;
        self.buf.clear();
        encode_frame(payload, &mut self.buf);
        self.write_buf()
    }

    /// Send the end-of-stream terminator.
    pub fn write_terminator(&mut self) -> Result<()> {
        self.buf.clear();
        encode_terminator(&mut self.buf);
        self.write_buf()
    }

    /// Send a request head.
    pub fn write_request_head(&mut self, head: &RequestHead) -> Result<()> {
        self.buf.clear();
        head.encode(&mut self.buf);
        self.write_buf()
    }

    /// Send a response head.
    pub fn write_response_head(&mut self, head: &ResponseHead) -> Result<()> {
        self.buf.clear();
        head.encode(&mut self.buf);
        self.write_buf()
    }

    /// Send a buffered body verbatim.
    pub fn write_body(&mut self, body: &[u8]) -> Result<()> {
        self.check_size(body.len())?;
        self.buf.clear();
        self.buf.extend_from_slice(body);
        self.write_buf()
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        Ok(())
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
