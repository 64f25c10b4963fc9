//! # Tessera
//!
//! Client SDK for user sessions: log in, link more credentials to the same
//! identity, log out, and run any of it off-thread with the result handed
//! back to the thread that asked.
//!
//! This crate re-exports the pieces most applications need. The layers
//! underneath are usable on their own:
//!
//! - [`tessera_protocol`]: wire records, credentials, codecs
//! - [`tessera_gateway`]: the [`RemoteGateway`] boundary to the backend
//! - [`tessera_dispatch`]: the worker pool and [`EventLoop`]
//! - [`tessera_session`]: [`App`], [`User`], and the session state machine
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera::prelude::*;
//!
//! # fn main() -> Result<(), TesseraError> {
//! let app = App::builder("notes-app")
//!     .gateway(Arc::new(InMemoryBackend::new()))
//!     .build()?;
//!
//! let user = app.log_in(&Credentials::anonymous())?;
//! user.link_user(&Credentials::email_password("ada@example.com", "pw"))?;
//! assert_eq!(user.identities().len(), 2);
//!
//! user.log_out()?;
//! assert_eq!(user.state(), UserState::LoggedOut);
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::TesseraError;

pub use tessera_dispatch;
pub use tessera_gateway;
pub use tessera_protocol;
pub use tessera_session;

pub use tessera_dispatch::{DispatchConfig, EventLoop, TaskHandle, TaskStatus};
#[cfg(feature = "memory")]
pub use tessera_gateway::InMemoryBackend;
pub use tessera_gateway::{RemoteError, RemoteGateway, RemoteOperation};
pub use tessera_protocol::{Credentials, Provider};
pub use tessera_session::{
    App, AppBuilder, AppConfig, AuthListener, User, UserError, UserIdentity, UserSnapshot,
    UserState, UserType,
};

/// Everything an application typically imports.
pub mod prelude {
    pub use crate::TesseraError;
    #[cfg(feature = "memory")]
    pub use tessera_gateway::InMemoryBackend;
    pub use tessera_dispatch::{EventLoop, TaskHandle};
    pub use tessera_gateway::{RemoteError, RemoteGateway};
    pub use tessera_protocol::{Credentials, Provider};
    pub use tessera_session::{App, AuthListener, User, UserError, UserState};
}

/// Installs a `tracing` subscriber that prints to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Returns
/// `false` if a global subscriber was already installed, in which case
/// nothing changes.
pub fn init_tracing() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
