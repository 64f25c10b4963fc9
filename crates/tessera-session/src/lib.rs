//! User sessions for Tessera.
//!
//! This crate handles the lifecycle of a logged-in identity:
//!
//! 1. **Login**: [`App::log_in`] turns credentials into a [`User`].
//! 2. **Linking**: [`User::link_user`] attaches more credentials to the
//!    same identity and swaps in a refreshed snapshot.
//! 3. **Logout / removal**: [`User::log_out`] and [`App::remove_user`]
//!    move the session to `LoggedOut` or `Removed`.
//!
//! Every operation has a blocking form and an `_async` form that runs on
//! the app's worker pool and calls back on the caller's
//! [`EventLoop`](tessera_dispatch::EventLoop).
//!
//! # How it fits in the stack
//!
//! ```text
//! Application code
//!     ↕
//! Session Layer (this crate)  ← User handles, state machine, registry
//!     ↕                 ↘
//! Gateway (remote ops)   Dispatch (workers, callback delivery)
//!     ↕
//! Protocol (records, credentials, codec)
//! ```

mod app;
mod config;
mod error;
mod listener;
mod registry;
mod snapshot;
mod state;
mod translate;
mod user;

pub use app::{App, AppBuilder};
pub use config::AppConfig;
pub use error::UserError;
pub use listener::AuthListener;
pub use snapshot::UserSnapshot;
pub use state::{UserState, UserType};
pub use tessera_protocol::IdentityRecord as UserIdentity;
pub use user::User;
