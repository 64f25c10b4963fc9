//! Codec trait and implementations for payload bytes.
//!
//! The gateway moves opaque bytes. Something has to decide how a
//! [`Credentials`](crate::Credentials) value becomes a request payload and
//! how a reply becomes a [`UserRecord`](crate::UserRecord). That something
//! is a [`Codec`]. Today there is [`JsonCodec`]; a binary codec can be
//! added later without touching the session layer.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values into payload bytes and decodes replies back.
///
/// `Send + Sync + 'static` because the codec is owned by the app context
/// and used from worker threads.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use tessera_protocol::{Codec, Credentials, JsonCodec};
///
/// let codec = JsonCodec;
/// let creds = Credentials::email_password("ana@example.com", "hunter2");
///
/// let bytes = codec.encode(&creds).unwrap();
/// let decoded: Credentials = codec.decode(&bytes).unwrap();
/// assert_eq!(creds, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
