use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Request header naming the call kind. Present on every request.
pub const CALL_KIND_HEADER: &str = "x-nestexec-call";

/// Fixed content-type marker for nestexec message bodies.
pub const CONTENT_TYPE_VALUE: &str = "application/x-nestexec+json";

/// The four calls the server answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    ListContainers,
    LaunchSession,
    AttachOutput,
    AttachInput,
}

impl CallKind {
    /// Header value for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::ListContainers => "list-containers",
            CallKind::LaunchSession => "launch-session",
            CallKind::AttachOutput => "attach-output",
            CallKind::AttachInput => "attach-input",
        }
    }

    /// Whether the request body is a chunked stream rather than one buffered `Call`.
    pub fn is_streaming_request(self) -> bool {
        matches!(self, CallKind::AttachInput)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallKind {
    type Err = ProtoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "list-containers" => Ok(CallKind::ListContainers),
            "launch-session" => Ok(CallKind::LaunchSession),
            "attach-output" => Ok(CallKind::AttachOutput),
            "attach-input" => Ok(CallKind::AttachInput),
            other => Err(ProtoError::UnknownCallKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_values_parse_back() {
        for kind in [
            CallKind::ListContainers,
            CallKind::LaunchSession,
            CallKind::AttachOutput,
            CallKind::AttachInput,
        ] {
            assert_eq!(kind.as_str().parse::<CallKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = "attach".parse::<CallKind>().unwrap_err();
        assert!(matches!(err, ProtoError::UnknownCallKind(k) if k == "attach"));
    }

    #[test]
    fn only_attach_input_streams_its_request() {
        assert!(CallKind::AttachInput.is_streaming_request());
        assert!(!CallKind::AttachOutput.is_streaming_request());
        assert!(!CallKind::LaunchSession.is_streaming_request());
        assert!(!CallKind::ListContainers.is_streaming_request());
    }
}
