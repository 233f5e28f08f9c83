//! Message types for the nestexec exec/attach protocol.
//!
//! Every request body, response body, and stream frame carries one of the
//! types defined here, serialized by [`encode`] and read back by [`decode`].
//! Requests also name their call kind in the [`CALL_KIND_HEADER`] header so
//! the server can route a chunked request before reading any of its body.

pub mod call;
pub mod codec;
pub mod error;
pub mod messages;

pub use call::{CallKind, CALL_KIND_HEADER, CONTENT_TYPE_VALUE};
pub use codec::{decode, encode};
pub use error::{ProtoError, Result};
pub use messages::{
    AttachMessage, Call, ControlMessage, InitiateStream, IoMessage, LaunchRequest,
    ListContainersRequest, ListContainersResponse, StdStream, WindowSize,
};
