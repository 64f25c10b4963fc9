//! The backend's view of a user.
//!
//! A [`UserRecord`] is what a login or link reply decodes into. It is
//! deliberately "raw": the state is a numeric code and the age bounds are
//! strings, exactly as the backend sends them. The session layer turns a
//! record into a validated snapshot and rejects anything it can't
//! interpret.

use serde::{Deserialize, Serialize};

use crate::Provider;

/// Wire code for a logged-in session.
pub const STATE_LOGGED_IN: u8 = 0;
/// Wire code for a logged-out session that is still known to the device.
pub const STATE_LOGGED_OUT: u8 = 1;
/// Wire code for a session that has been removed from the device.
pub const STATE_REMOVED: u8 = 2;

/// One external identity linked to a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// The identity's id at its provider.
    pub id: String,
    pub provider: Provider,
}

/// Profile attributes. Every field is optional; providers fill in
/// whatever they know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    /// Integer encoded as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age: Option<String>,
    /// Integer encoded as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,
}

/// A user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable, backend-assigned user id.
    pub id: String,

    #[serde(default)]
    pub profile: ProfileRecord,

    /// Linked identities in the order they were linked.
    #[serde(default)]
    pub identities: Vec<IdentityRecord>,

    pub access_token: String,
    pub refresh_token: String,

    /// One of [`STATE_LOGGED_IN`], [`STATE_LOGGED_OUT`], [`STATE_REMOVED`].
    pub state: u8,

    /// `"normal"`, `"server"`, or something newer this client ignores.
    #[serde(default = "default_user_type")]
    pub user_type: String,
}

fn default_user_type() -> String {
    "normal".to_string()
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Codec, JsonCodec};

    #[test]
    fn test_decode_minimal_record_fills_defaults() {
        let json = br#"{
            "id": "u-1",
            "access_token": "a",
            "refresh_token": "r",
            "state": 0
        }"#;

        let record: UserRecord = JsonCodec.decode(json).unwrap();

        assert_eq!(record.id, "u-1");
        assert_eq!(record.profile, ProfileRecord::default());
        assert!(record.identities.is_empty());
        assert_eq!(record.user_type, "normal");
        assert_eq!(record.state, STATE_LOGGED_IN);
    }

    #[test]
    fn test_decode_identities_keep_order() {
        let json = br#"{
            "id": "u-1",
            "identities": [
                {"id": "p1", "provider": "anonymous"},
                {"id": "p2", "provider": "email-password"}
            ],
            "access_token": "a",
            "refresh_token": "r",
            "state": 0
        }"#;

        let record: UserRecord = JsonCodec.decode(json).unwrap();

        let providers: Vec<_> =
            record.identities.iter().map(|i| i.provider).collect();
        assert_eq!(providers, vec![Provider::Anonymous, Provider::EmailPassword]);
    }

    #[test]
    fn test_encode_skips_absent_profile_fields() {
        let record = UserRecord {
            id: "u-1".into(),
            profile: ProfileRecord {
                email: Some("ana@example.com".into()),
                ..ProfileRecord::default()
            },
            identities: vec![],
            access_token: "a".into(),
            refresh_token: "r".into(),
            state: STATE_LOGGED_IN,
            user_type: "normal".into(),
        };

        let text = String::from_utf8(JsonCodec.encode(&record).unwrap()).unwrap();

        assert!(text.contains("ana@example.com"));
        assert!(!text.contains("picture_url"));
    }
}
