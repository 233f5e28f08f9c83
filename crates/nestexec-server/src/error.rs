use std::io;

/// Errors from container registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A live entry already uses this id.
    #[error("container '{0}' already exists")]
    AlreadyExists(String),

    /// No entry is registered under this id.
    #[error("container '{0}' not found")]
    NotFound(String),

    /// The output pipes were already handed to another attach.
    #[error("output of container '{0}' is already attached")]
    AlreadyAttached(String),

    /// The child's stdin has been closed.
    #[error("stdin of container '{0}' is closed")]
    InputClosed(String),

    /// The process could not be started.
    #[error("failed to spawn container '{id}': {source}")]
    Spawn {
        id: String,
        #[source]
        source: io::Error,
    },

    /// Pipe I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while serving a connection.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("transport error: {0}")]
    Transport(#[from] nestexec_transport::TransportError),

    #[error("frame error: {0}")]
    Frame(#[from] nestexec_frame::FrameError),

    #[error("protocol error: {0}")]
    Proto(#[from] nestexec_proto::ProtoError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An attach-input stream ended without its initiate message.
    #[error("attach stream ended before the initiate message")]
    MissingInitiate,

    /// An attach-input stream ended before the end-of-input sentinel.
    #[error("attach stream ended before the end-of-input sentinel")]
    InputEndedEarly,

    /// A drain worker panicked.
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, ServerError>;
