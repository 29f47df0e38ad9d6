//! Serialization port.
//!
//! A [`Codec`] turns a JSON value graph into bytes and back and declares the
//! MIME content type and transfer encoding of its output, which the charset
//! negotiation in [`crate::charset`] relies on.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::LicenseResult;

pub trait Codec: Send + Sync {
    /// MIME content type of the encoded bytes, possibly with parameters.
    fn content_type(&self) -> &str;

    /// MIME content transfer encoding of the encoded bytes.
    fn content_transfer_encoding(&self) -> &str;

    fn encode(&self, value: &Value) -> LicenseResult<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> LicenseResult<Value>;
}

impl<C: Codec + ?Sized> Codec for Arc<C> {
    fn content_type(&self) -> &str {
        (**self).content_type()
    }

    fn content_transfer_encoding(&self) -> &str {
        (**self).content_transfer_encoding()
    }

    fn encode(&self, value: &Value) -> LicenseResult<Vec<u8>> {
        (**self).encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> LicenseResult<Value> {
        (**self).decode(bytes)
    }
}

/// Encodes any serializable value.
pub fn encode<T: Serialize + ?Sized>(codec: &dyn Codec, value: &T) -> LicenseResult<Vec<u8>> {
    codec.encode(&serde_json::to_value(value)?)
}

/// Decodes any deserializable value.
pub fn decode<T: DeserializeOwned>(codec: &dyn Codec, bytes: &[u8]) -> LicenseResult<T> {
    Ok(serde_json::from_value(codec.decode(bytes)?)?)
}

/// Returns a deep copy made by encoding and decoding `value`.
pub fn duplicate<T: Serialize + DeserializeOwned>(codec: &dyn Codec, value: &T) -> LicenseResult<T> {
    decode(codec, &encode(codec, value)?)
}

/// JSON in UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        "application/json; charset=utf-8"
    }

    fn content_transfer_encoding(&self) -> &str {
        "8bit"
    }

    fn encode(&self, value: &Value) -> LicenseResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> LicenseResult<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Replays encoded bytes so that callers can obtain fresh copies of the
/// encoded object without encoding it again.
#[derive(Clone)]
pub struct Decoder {
    codec: Arc<dyn Codec>,
    bytes: Vec<u8>,
}

impl Decoder {
    pub fn new(codec: Arc<dyn Codec>, bytes: Vec<u8>) -> Self {
        Self { codec, bytes }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> LicenseResult<T> {
        decode(self.codec.as_ref(), &self.bytes)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("content_type", &self.codec.content_type())
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::License;

    #[test]
    fn duplicate_is_equal_but_independent() {
        let original = License {
            subject: Some("Acme".into()),
            ..Default::default()
        };
        let mut copy = duplicate(&JsonCodec, &original).unwrap();
        assert_eq!(copy, original);
        copy.subject = Some("Other".into());
        assert_eq!(original.subject.as_deref(), Some("Acme"));
    }

    #[test]
    fn decoder_replays_bytes() {
        let bytes = encode(&JsonCodec, &serde_json::json!({"a": 1})).unwrap();
        let decoder = Decoder::new(Arc::new(JsonCodec), bytes.clone());
        let first: Value = decoder.decode().unwrap();
        let second: Value = decoder.decode().unwrap();
        assert_eq!(first, second);
        assert_eq!(decoder.bytes(), bytes.as_slice());
    }
}
