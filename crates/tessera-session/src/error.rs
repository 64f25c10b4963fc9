//! Error types for the session layer.

use tessera_dispatch::DispatchError;
use tessera_gateway::RemoteError;
use tessera_protocol::ProtocolError;

/// Errors returned by [`User`](crate::User) and [`App`](crate::App)
/// operations.
///
/// They fall into three classes:
///
/// - **usage** ([`is_usage`](Self::is_usage)): the caller asked for
///   something that can't work right now (link while logged out, async
///   call without an event loop). Nothing was sent to the backend.
/// - **remote** ([`is_remote`](Self::is_remote)): the backend said no.
///   Local state is untouched.
/// - **invariant violation**
///   ([`is_invariant_violation`](Self::is_invariant_violation)): the
///   backend's reply breaks the protocol. This is a bug on one side or
///   the other, not something to retry.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// The session is in the wrong state for this operation.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The app was configured with unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The async operation could not be scheduled.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The backend reported a failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The backend's reply could not be interpreted.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
}

impl UserError {
    pub(crate) fn not_logged_in() -> Self {
        Self::IllegalState("user is not logged in".to_string())
    }

    /// Precondition failures; nothing reached the backend.
    pub fn is_usage(&self) -> bool {
        match self {
            Self::IllegalState(_) | Self::InvalidConfig(_) => true,
            Self::Dispatch(err) => !matches!(err, DispatchError::Runtime(_)),
            Self::Remote(_) | Self::Protocol(_) => false,
        }
    }

    /// Backend-reported failures.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Replies that break the protocol contract.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// The backend error, if this is one.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_logged_in_is_usage() {
        let err = UserError::not_logged_in();

        assert!(err.is_usage());
        assert!(!err.is_remote());
        assert_eq!(err.to_string(), "illegal state: user is not logged in");
    }

    #[test]
    fn test_no_event_loop_is_usage() {
        let err: UserError = DispatchError::NoEventLoop.into();

        assert!(err.is_usage());
    }

    #[test]
    fn test_remote_error_is_carried_verbatim() {
        let err: UserError = RemoteError::new(47, "bad password").into();

        assert!(err.is_remote());
        assert_eq!(err.remote().map(|r| r.code), Some(47));
        assert_eq!(err.to_string(), "remote error 47: bad password");
    }

    #[test]
    fn test_protocol_error_is_invariant_violation() {
        let err: UserError = ProtocolError::UnknownStateCode(9).into();

        assert!(err.is_invariant_violation());
        assert!(!err.is_usage());
    }
}
