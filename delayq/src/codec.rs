//! Payload codecs
//!
//! Payloads are stored as text so producers and consumers with different
//! Rust types can share a topic. [`JsonCodec`] is the default.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

/// Encodes payloads to their stored text form and back
pub trait PayloadCodec<T>: Send + Sync {
    /// Encode a payload before it is written to the store
    fn encode(&self, payload: &T) -> Result<String>;

    /// Decode a stored payload
    ///
    /// Errors are reported as a plain reason; the scheduler attaches the
    /// topic and task id.
    fn decode(&self, raw: &str) -> std::result::Result<T, String>;
}

/// JSON text codec backed by `serde_json`
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> PayloadCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, payload: &T) -> Result<String> {
        serde_json::to_string(payload).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn decode(&self, raw: &str) -> std::result::Result<T, String> {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Email {
        to: String,
        retries: u32,
    }

    #[test]
    fn test_json_struct() {
        let codec = JsonCodec::<Email>::new();
        let email = Email { to: "ops@example.com".into(), retries: 2 };

        let raw = codec.encode(&email).unwrap();
        assert_eq!(raw, r#"{"to":"ops@example.com","retries":2}"#);
        assert_eq!(codec.decode(&raw).unwrap(), email);
    }

    #[test]
    fn test_json_string_is_quoted() {
        let codec = JsonCodec::<String>::new();
        assert_eq!(codec.encode(&"hello".to_string()).unwrap(), "\"hello\"");
        assert!(codec.decode("hello").is_err());
    }

    #[test]
    fn test_decode_reports_reason() {
        let codec = JsonCodec::<Email>::new();
        let reason = codec.decode("{not json").unwrap_err();
        assert!(!reason.is_empty());
    }
}
