//! Session state machine.

use std::fmt;

use tessera_protocol::{ProtocolError, STATE_LOGGED_IN, STATE_LOGGED_OUT, STATE_REMOVED};

/// Where a session is in its lifecycle.
///
/// ```text
///   LoggedIn ──(log out)──→ LoggedOut ──(remove)──→ Removed
///       │  ↑                    │                      ▲
///       │  └────(log in)────────┘                      │
///       └──────(remove / anonymous log out)────────────┘
/// ```
///
/// - **LoggedIn**: tokens are valid; every operation is allowed.
/// - **LoggedOut**: tokens are cleared, but the user is still known to the
///   app (e.g. for an account picker). Logging in again revives it.
/// - **Removed**: the session is gone from the app. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserState {
    LoggedIn,
    LoggedOut,
    Removed,
}

impl UserState {
    /// Decodes a wire state code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownStateCode`] for anything this client
    /// doesn't recognize; that means client and backend disagree about the
    /// protocol.
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            STATE_LOGGED_IN => Ok(Self::LoggedIn),
            STATE_LOGGED_OUT => Ok(Self::LoggedOut),
            STATE_REMOVED => Ok(Self::Removed),
            other => Err(ProtocolError::UnknownStateCode(other)),
        }
    }

    /// The wire code for this state.
    pub fn code(self) -> u8 {
        match self {
            Self::LoggedIn => STATE_LOGGED_IN,
            Self::LoggedOut => STATE_LOGGED_OUT,
            Self::Removed => STATE_REMOVED,
        }
    }

    pub fn is_logged_in(self) -> bool {
        matches!(self, Self::LoggedIn)
    }

    /// Returns `true` if moving from `self` to `target` is allowed.
    /// Staying put always is, except that nothing leaves `Removed`.
    pub fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::Removed, Self::Removed) => true,
            (Self::Removed, _) => false,
            (_, _) => true,
        }
    }
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedIn => write!(f, "LoggedIn"),
            Self::LoggedOut => write!(f, "LoggedOut"),
            Self::Removed => write!(f, "Removed"),
        }
    }
}

/// The kind of principal a user is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserType {
    /// A person using the app.
    Normal,
    /// A server-side principal (API key owned by the app).
    Server,
    /// A type this client doesn't know yet.
    Unknown,
}

impl UserType {
    /// Decodes the backend's type key. Never fails: new types are
    /// `Unknown`.
    pub fn from_key(key: &str) -> Self {
        match key {
            "normal" => Self::Normal,
            "server" => Self::Server,
            _ => Self::Unknown,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_known_codes() {
        assert_eq!(UserState::from_code(0).unwrap(), UserState::LoggedIn);
        assert_eq!(UserState::from_code(1).unwrap(), UserState::LoggedOut);
        assert_eq!(UserState::from_code(2).unwrap(), UserState::Removed);
    }

    #[test]
    fn test_from_code_unknown_returns_error() {
        let result = UserState::from_code(42);

        assert!(matches!(result, Err(ProtocolError::UnknownStateCode(42))));
    }

    #[test]
    fn test_code_round_trips_for_every_state() {
        for state in [UserState::LoggedIn, UserState::LoggedOut, UserState::Removed] {
            assert_eq!(UserState::from_code(state.code()).unwrap(), state);
        }
    }

    #[test]
    fn test_removed_is_terminal() {
        assert!(!UserState::Removed.can_transition_to(UserState::LoggedIn));
        assert!(!UserState::Removed.can_transition_to(UserState::LoggedOut));
        assert!(UserState::Removed.can_transition_to(UserState::Removed));
    }

    #[test]
    fn test_logged_out_can_log_back_in() {
        assert!(UserState::LoggedOut.can_transition_to(UserState::LoggedIn));
        assert!(UserState::LoggedOut.can_transition_to(UserState::Removed));
        assert!(UserState::LoggedIn.can_transition_to(UserState::LoggedOut));
        assert!(UserState::LoggedIn.can_transition_to(UserState::Removed));
    }

    #[test]
    fn test_is_logged_in_only_for_logged_in() {
        assert!(UserState::LoggedIn.is_logged_in());
        assert!(!UserState::LoggedOut.is_logged_in());
        assert!(!UserState::Removed.is_logged_in());
    }

    #[test]
    fn test_user_type_unknown_key() {
        assert_eq!(UserType::from_key("normal"), UserType::Normal);
        assert_eq!(UserType::from_key("server"), UserType::Server);
        assert_eq!(UserType::from_key("robot"), UserType::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(UserState::LoggedOut.to_string(), "LoggedOut");
    }
}
