use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::call::CallKind;
use crate::error::{ProtoError, Result};

/// A buffered request body. The variant must agree with the call-kind header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Call {
    ListContainers(ListContainersRequest),
    LaunchSession(LaunchRequest),
    AttachOutput(AttachMessage),
    AttachInput(AttachMessage),
}

impl Call {
    /// The call kind this body encodes.
    pub fn kind(&self) -> CallKind {
        match self {
            Call::ListContainers(_) => CallKind::ListContainers,
            Call::LaunchSession(_) => CallKind::LaunchSession,
            Call::AttachOutput(_) => CallKind::AttachOutput,
            Call::AttachInput(_) => CallKind::AttachInput,
        }
    }
}

/// Request for the set of live container ids. Carries no fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListContainersRequest {}

/// Ids of every registered container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListContainersResponse {
    pub ids: BTreeSet<String>,
}

/// Launch `cmd args...` under a caller-chosen container id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub container_id: String,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A message exchanged on an attach stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum AttachMessage {
    Control(ControlMessage),
    Io(IoMessage),
}

impl AttachMessage {
    /// Opening message of an attach stream.
    pub fn initiate(container_id: impl Into<String>, tty: bool, interactive: bool) -> Self {
        AttachMessage::Control(ControlMessage::InitiateStream(InitiateStream {
            container_id: container_id.into(),
            tty,
            interactive,
        }))
    }

    /// Terminal dimension notice.
    pub fn window_size(rows: u16, cols: u16) -> Self {
        AttachMessage::Control(ControlMessage::WindowSize(WindowSize { rows, cols }))
    }

    /// Require this message to be `Control(InitiateStream)`.
    pub fn into_initiate(self) -> Result<InitiateStream> {
        match self {
            AttachMessage::Control(ControlMessage::InitiateStream(init)) => Ok(init),
            other => Err(ProtoError::UnexpectedMessage {
                expected: "initiate_stream",
                found: other.label(),
            }),
        }
    }

    /// Short name for logs and errors.
    pub fn label(&self) -> &'static str {
        match self {
            AttachMessage::Control(ControlMessage::InitiateStream(_)) => "initiate_stream",
            AttachMessage::Control(ControlMessage::WindowSize(_)) => "window_size",
            AttachMessage::Io(io) => match io.stream {
                StdStream::Stdin => "stdin",
                StdStream::Stdout => "stdout",
                StdStream::Stderr => "stderr",
            },
        }
    }
}

impl From<IoMessage> for AttachMessage {
    fn from(io: IoMessage) -> Self {
        AttachMessage::Io(io)
    }
}

/// Out-of-band messages on an attach stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ControlMessage {
    InitiateStream(InitiateStream),
    WindowSize(WindowSize),
}

/// Names the session an attach stream binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateStream {
    pub container_id: String,
    #[serde(default)]
    pub tty: bool,
    #[serde(default)]
    pub interactive: bool,
}

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

/// Which standard stream an [`IoMessage`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

/// A slice of bytes on one standard stream.
///
/// An empty `Stdin` message is the end-of-input sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoMessage {
    pub stream: StdStream,
    #[serde(with = "crate::codec::base64_bytes")]
    pub data: Vec<u8>,
}

impl IoMessage {
    pub fn new(stream: StdStream, data: impl Into<Vec<u8>>) -> Self {
        Self {
            stream,
            data: data.into(),
        }
    }

    pub fn stdin(data: impl Into<Vec<u8>>) -> Self {
        Self::new(StdStream::Stdin, data)
    }

    pub fn stdout(data: impl Into<Vec<u8>>) -> Self {
        Self::new(StdStream::Stdout, data)
    }

    pub fn stderr(data: impl Into<Vec<u8>>) -> Self {
        Self::new(StdStream::Stderr, data)
    }

    /// The end-of-input sentinel.
    pub fn stdin_eof() -> Self {
        Self::new(StdStream::Stdin, Vec::new())
    }

    pub fn is_stdin_eof(&self) -> bool {
        self.stream == StdStream::Stdin && self.data.is_empty()
    }
}
