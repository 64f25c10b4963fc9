/// A failure reported by the backend (or by the transport on its behalf).
///
/// The code and message are carried verbatim. The SDK never rewrites them
/// and never retries; the caller decides what a given code means for them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote error {code}: {message}")]
pub struct RemoteError {
    pub code: i32,
    pub message: String,
}

impl RemoteError {
    /// The session's access token was rejected.
    pub const INVALID_SESSION: i32 = 2;
    /// No user with the given id exists.
    pub const USER_NOT_FOUND: i32 = 45;
    /// The backend doesn't allow this operation for these credentials.
    pub const UNSUPPORTED_OPERATION: i32 = 46;
    /// Wrong password, expired token, and similar.
    pub const INVALID_CREDENTIALS: i32 = 47;
    /// The credentials already belong to a different user.
    pub const CREDENTIAL_IN_USE: i32 = 48;
    /// The request payload couldn't be understood.
    pub const BAD_REQUEST: i32 = 400;
    /// The backend could not be reached at all.
    pub const NETWORK_UNAVAILABLE: i32 = 1000;
    /// The transport gave up waiting for a reply.
    pub const NETWORK_TIMEOUT: i32 = 1001;

    /// Creates an error from a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` for codes the transport assigns (1000..2000).
    pub fn is_network(&self) -> bool {
        (1000..2000).contains(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_message() {
        let err = RemoteError::new(RemoteError::INVALID_CREDENTIALS, "bad password");

        assert_eq!(err.to_string(), "remote error 47: bad password");
    }

    #[test]
    fn test_is_network_only_for_transport_range() {
        assert!(RemoteError::new(RemoteError::NETWORK_TIMEOUT, "").is_network());
        assert!(!RemoteError::new(RemoteError::INVALID_SESSION, "").is_network());
        assert!(!RemoteError::new(2000, "").is_network());
    }
}
