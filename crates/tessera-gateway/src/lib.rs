//! Remote operation gateway for Tessera.
//!
//! Provides the [`RemoteGateway`] trait: the single boundary through which
//! the SDK asks the application backend to do something (log in, link
//! credentials, log out, remove a user). How the request actually gets
//! there (HTTP, a native bridge, a test double) is the implementor's
//! business.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`InMemoryBackend`], a self-contained backend
//!   for tests, demos, and offline development.

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::RemoteError;
#[cfg(feature = "memory")]
pub use memory::InMemoryBackend;

use std::fmt;
use std::sync::Arc;

use tessera_protocol::UserRecord;

/// The named operations the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    LogIn,
    LinkCredentials,
    LogOut,
    RemoveUser,
}

impl RemoteOperation {
    /// The operation's name as the backend knows it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LogIn => "log_in",
            Self::LinkCredentials => "link_credentials",
            Self::LogOut => "log_out",
            Self::RemoveUser => "remove_user",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a gateway needs to execute one remote operation.
#[derive(Debug, Clone, Copy)]
pub struct RemoteRequest<'a> {
    pub operation: RemoteOperation,
    /// The owning application's id.
    pub app_id: &'a str,
    /// The session the operation acts on. `None` for login.
    pub session: Option<&'a UserRecord>,
    /// Encoded operation arguments (credentials for login and link).
    pub payload: &'a [u8],
}

/// Opaque reply bytes from a successful operation.
///
/// Login and link replies carry an encoded [`UserRecord`]; logout and
/// remove replies are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReply(Vec<u8>);

impl RawReply {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// A reply with no body.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Executes named operations against the application backend.
///
/// # Contract
///
/// - Exactly one of `Ok` / `Err` is returned per call.
/// - The gateway doesn't interpret the payload, doesn't retry, and has
///   no timeout of its own. Those belong to the transport.
/// - It may block the calling thread for the duration of the call.
///
/// `Send + Sync + 'static` because one gateway is shared by every worker
/// of the app's dispatcher.
pub trait RemoteGateway: Send + Sync + 'static {
    /// Executes the operation and returns the raw reply or the backend's
    /// error.
    fn invoke(&self, request: RemoteRequest<'_>) -> Result<RawReply, RemoteError>;
}

impl<G: RemoteGateway + ?Sized> RemoteGateway for Arc<G> {
    fn invoke(&self, request: RemoteRequest<'_>) -> Result<RawReply, RemoteError> {
        (**self).invoke(request)
    }
}
