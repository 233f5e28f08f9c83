/// Errors that can occur during frame or head encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The chunk length line is not a valid hex length.
    #[error("malformed chunk length: {0}")]
    MalformedLength(String),

    /// The chunk payload is not followed by CRLF.
    #[error("chunk payload not terminated by CRLF")]
    MissingDelimiter,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The request or response head could not be parsed.
    #[error("malformed head: {0}")]
    MalformedHead(String),

    /// The head did not end within the configured maximum size.
    #[error("head exceeds {max} bytes")]
    HeadTooLarge { max: usize },

    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete unit was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
