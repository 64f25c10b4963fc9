//! Wire-level vocabulary shared by every Tessera layer.
//!
//! This crate defines what travels between the SDK and the remote
//! application backend:
//!
//! - **Credentials** ([`Credentials`], [`Provider`]): opaque,
//!   provider-tagged login material.
//! - **Records** ([`UserRecord`], [`ProfileRecord`], [`IdentityRecord`]):
//!   the backend's view of a user, before the session layer validates it.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values are
//!   turned into payload bytes and back.
//! - **Errors** ([`ProtocolError`]): a reply that can't be decoded or
//!   breaks a protocol invariant.
//!
//! # Architecture
//!
//! ```text
//! Session (User handle) → Protocol (records, credentials) → Gateway (bytes)
//! ```
//!
//! Nothing in here knows about threads, state machines, or registries.

mod codec;
mod credentials;
mod error;
mod record;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use credentials::{Credentials, Provider};
pub use error::ProtocolError;
pub use record::{
    IdentityRecord, ProfileRecord, UserRecord, STATE_LOGGED_IN,
    STATE_LOGGED_OUT, STATE_REMOVED,
};
