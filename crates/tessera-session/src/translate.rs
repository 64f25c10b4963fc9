//! Turns gateway outcomes into session results.
//!
//! The gateway hands back `Result<RawReply, RemoteError>`, so "both set"
//! and "neither set" can't happen. What's left is decoding the reply and
//! checking it against what the session expects.

use tessera_gateway::{RawReply, RemoteError};
use tessera_protocol::{Codec, ProtocolError, UserRecord};

use crate::{UserError, UserSnapshot};

/// Decodes a login or link reply into a validated snapshot.
pub(crate) fn user_snapshot<C: Codec>(
    codec: &C,
    outcome: Result<RawReply, RemoteError>,
) -> Result<UserSnapshot, UserError> {
    let reply = outcome?;
    let record: UserRecord = codec.decode(reply.as_bytes())?;
    Ok(UserSnapshot::try_from(record)?)
}

/// For operations whose reply carries no data (logout, removal).
pub(crate) fn unit(outcome: Result<RawReply, RemoteError>) -> Result<(), UserError> {
    outcome.map(drop).map_err(UserError::from)
}

/// A link must come back as the same user it was sent as.
pub(crate) fn same_user(
    before: &UserSnapshot,
    after: UserSnapshot,
) -> Result<UserSnapshot, UserError> {
    if before.id() != after.id() {
        return Err(ProtocolError::IdentityChanged {
            expected: before.id().to_string(),
            actual: after.id().to_string(),
        }
        .into());
    }
    Ok(after)
}
