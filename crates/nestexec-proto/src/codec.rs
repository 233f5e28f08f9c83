use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtoError, Result};

/// Serialize a message to its wire bytes.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(ProtoError::Encode)
}

/// Deserialize a message from its wire bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(ProtoError::Decode)
}

/// Serde adapter carrying raw bytes as a standard base64 string.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{IoMessage, LaunchRequest};

    #[test]
    fn io_data_travels_as_base64() {
        let bytes = encode(&IoMessage::stdout(b"hi\n".to_vec())).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"stream":"stdout","data":"aGkK"}"#);
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        let err = decode::<IoMessage>(br#"{"stream":"stdin","data":"***"}"#).unwrap_err();
        assert!(matches!(err, ProtoError::Decode(_)));
    }

    #[test]
    fn garbage_is_decode_error() {
        let err = decode::<LaunchRequest>(b"not json").unwrap_err();
        assert!(matches!(err, ProtoError::Decode(_)));
        assert!(err.to_string().starts_with("failed to decode message"));
    }
}
