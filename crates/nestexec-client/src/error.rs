/// Errors surfaced by client calls and sessions.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] nestexec_transport::TransportError),

    #[error("frame error: {0}")]
    Frame(#[from] nestexec_frame::FrameError),

    #[error("protocol error: {0}")]
    Proto(#[from] nestexec_proto::ProtoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server already runs a container under this id.
    #[error("container '{0}' already exists")]
    Conflict(String),

    /// Another client already holds the container's output.
    #[error("output of container '{0}' is already attached")]
    AlreadyAttached(String),

    #[error("container '{0}' not found")]
    NotFound(String),

    /// The server rejected the request as malformed.
    #[error("server rejected the request as malformed")]
    BadRequest,

    #[error("unexpected response status {0}")]
    UnexpectedStatus(u16),

    /// A session task ended without reporting back.
    #[error("{0} ended unexpectedly")]
    TaskLost(&'static str),

    #[error("interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, ClientError>;
