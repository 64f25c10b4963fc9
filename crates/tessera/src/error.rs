//! Unified error type for the Tessera SDK.

use tessera_dispatch::DispatchError;
use tessera_gateway::RemoteError;
use tessera_protocol::ProtocolError;
use tessera_session::UserError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors, so code
/// using the `tessera` crate can return a single error type.
#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    /// A session operation failed (state, remote, or protocol).
    #[error(transparent)]
    User(#[from] UserError),

    /// The backend reported a failure outside a session operation.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Encoding or decoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The worker pool or event loop couldn't be set up.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl TesseraError {
    /// The backend's error, wherever it is nested.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::User(err) => err.remote(),
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }
}
