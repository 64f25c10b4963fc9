//! Error types for the protocol layer.
//!
//! A `ProtocolError` means the SDK and the backend disagree about the
//! shape of the data. These are never caused by the end user: a wrong
//! password is a remote error, an unknown state code is a protocol error.

/// Errors that can occur while encoding, decoding, or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outgoing payload failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The reply bytes are not a valid record.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The backend reported a session state this client doesn't know.
    #[error("unknown user state code: {0}")]
    UnknownStateCode(u8),

    /// A field decoded fine but its contents are malformed
    /// (e.g. `min_age` that isn't an integer).
    #[error("invalid value {value:?} for field `{field}`")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The raw value as received.
        value: String,
    },

    /// A refreshed record came back with a different user id.
    #[error("user id changed from {expected} to {actual}")]
    IdentityChanged {
        /// The id the session was created with.
        expected: String,
        /// The id the backend returned.
        actual: String,
    },
}
