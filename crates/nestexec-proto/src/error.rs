/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Bytes did not decode to the expected message type.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// The call-kind header named no known call.
    #[error("unknown call kind '{0}'")]
    UnknownCallKind(String),

    /// A well-formed message arrived where a different one was required.
    #[error("unexpected message: expected {expected}, found {found}")]
    UnexpectedMessage {
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
