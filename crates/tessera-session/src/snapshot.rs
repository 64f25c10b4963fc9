//! Validated, immutable views of a user record.

use tessera_protocol::{IdentityRecord, ProtocolError, UserRecord};

use crate::{UserState, UserType};

/// One consistent view of a user at a point in time.
///
/// A snapshot is built from a [`UserRecord`] through `TryFrom`, which
/// checks everything the backend could get wrong: the state code, the
/// numeric age bounds. Once built it never changes; operations that alter
/// a session produce a new snapshot and swap it in whole, so readers never
/// see a half-updated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserSnapshot {
    record: UserRecord,
    state: UserState,
    user_type: UserType,
    min_age: Option<i64>,
    max_age: Option<i64>,
}

impl TryFrom<UserRecord> for UserSnapshot {
    type Error = ProtocolError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let state = UserState::from_code(record.state)?;
        let user_type = UserType::from_key(&record.user_type);
        let min_age = parse_age("min_age", record.profile.min_age.as_deref())?;
        let max_age = parse_age("max_age", record.profile.max_age.as_deref())?;

        Ok(Self {
            record,
            state,
            user_type,
            min_age,
            max_age,
        })
    }
}

fn non_empty(token: &str) -> Option<&str> {
    (!token.is_empty()).then_some(token)
}

fn parse_age(field: &'static str, raw: Option<&str>) -> Result<Option<i64>, ProtocolError> {
    raw.map(|value| {
        value.trim().parse::<i64>().map_err(|_| ProtocolError::InvalidField {
            field,
            value: value.to_string(),
        })
    })
    .transpose()
}

impl UserSnapshot {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn state(&self) -> UserState {
        self.state
    }

    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    /// Linked identities, in the order the backend returned them.
    pub fn identities(&self) -> &[IdentityRecord] {
        &self.record.identities
    }

    /// `None` once the session has logged out.
    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.record.access_token)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        non_empty(&self.record.refresh_token)
    }

    pub fn name(&self) -> Option<&str> {
        self.record.profile.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.record.profile.email.as_deref()
    }

    pub fn picture_url(&self) -> Option<&str> {
        self.record.profile.picture_url.as_deref()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.record.profile.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.record.profile.last_name.as_deref()
    }

    pub fn gender(&self) -> Option<&str> {
        self.record.profile.gender.as_deref()
    }

    pub fn birthday(&self) -> Option<&str> {
        self.record.profile.birthday.as_deref()
    }

    pub fn min_age(&self) -> Option<i64> {
        self.min_age
    }

    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    /// The wire form, as sent back to the gateway with each request.
    pub fn record(&self) -> &UserRecord {
        &self.record
    }

    /// `true` when every linked identity is anonymous. A user with no
    /// identities at all is not anonymous.
    pub fn is_anonymous(&self) -> bool {
        !self.record.identities.is_empty()
            && self
                .record
                .identities
                .iter()
                .all(|identity| identity.provider.is_anonymous())
    }

    /// The snapshot a successful logout leaves behind.
    ///
    /// Anonymous-only users can never log back in, so they go straight to
    /// `Removed`; everyone else becomes `LoggedOut`. Tokens are cleared
    /// either way. A removed snapshot stays as it is.
    pub(crate) fn after_log_out(&self) -> Self {
        match self.state {
            UserState::Removed => self.clone(),
            _ if self.is_anonymous() => self.with_state(UserState::Removed),
            _ => self.with_state(UserState::LoggedOut),
        }
    }

    /// The snapshot an explicit removal leaves behind.
    pub(crate) fn after_remove(&self) -> Self {
        self.with_state(UserState::Removed)
    }

    fn with_state(&self, state: UserState) -> Self {
        debug_assert!(self.state.can_transition_to(state));
        let mut next = self.clone();
        next.state = state;
        next.record.state = state.code();
        if !state.is_logged_in() {
            next.record.access_token.clear();
            next.record.refresh_token.clear();
        }
        next
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tessera_protocol::{ProfileRecord, Provider, STATE_LOGGED_IN, STATE_REMOVED};

    pub(crate) fn record(id: &str, providers: &[Provider]) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            profile: ProfileRecord::default(),
            identities: providers
                .iter()
                .enumerate()
                .map(|(i, provider)| IdentityRecord {
                    id: format!("p{}", i + 1),
                    provider: *provider,
                })
                .collect(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            state: STATE_LOGGED_IN,
            user_type: "normal".into(),
        }
    }

    #[test]
    fn test_try_from_valid_record() {
        let mut raw = record("u1", &[Provider::EmailPassword]);
        raw.profile.email = Some("a@example.com".into());
        raw.profile.min_age = Some("18".into());

        let snapshot = UserSnapshot::try_from(raw).unwrap();

        assert_eq!(snapshot.id(), "u1");
        assert_eq!(snapshot.state(), UserState::LoggedIn);
        assert_eq!(snapshot.user_type(), UserType::Normal);
        assert_eq!(snapshot.email(), Some("a@example.com"));
        assert_eq!(snapshot.min_age(), Some(18));
        assert_eq!(snapshot.max_age(), None);
        assert_eq!(snapshot.access_token(), Some("access"));
    }

    #[test]
    fn test_try_from_unknown_state_is_rejected() {
        let mut raw = record("u1", &[]);
        raw.state = 7;

        let result = UserSnapshot::try_from(raw);

        assert!(matches!(result, Err(ProtocolError::UnknownStateCode(7))));
    }

    #[test]
    fn test_try_from_non_numeric_age_is_rejected() {
        let mut raw = record("u1", &[]);
        raw.profile.max_age = Some("old".into());

        let result = UserSnapshot::try_from(raw);

        match result {
            Err(ProtocolError::InvalidField { field, value }) => {
                assert_eq!(field, "max_age");
                assert_eq!(value, "old");
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn test_is_anonymous_requires_all_anonymous() {
        let anon = UserSnapshot::try_from(record("u", &[Provider::Anonymous])).unwrap();
        let mixed = UserSnapshot::try_from(record(
            "u",
            &[Provider::Anonymous, Provider::EmailPassword],
        ))
        .unwrap();
        let none = UserSnapshot::try_from(record("u", &[])).unwrap();

        assert!(anon.is_anonymous());
        assert!(!mixed.is_anonymous());
        assert!(!none.is_anonymous());
    }

    #[test]
    fn test_after_log_out_anonymous_is_removed() {
        let anon = UserSnapshot::try_from(record("u", &[Provider::Anonymous])).unwrap();

        let next = anon.after_log_out();

        assert_eq!(next.state(), UserState::Removed);
        assert_eq!(next.record().state, STATE_REMOVED);
        assert_eq!(next.access_token(), None);
        assert_eq!(next.refresh_token(), None);
    }

    #[test]
    fn test_after_log_out_linked_is_logged_out() {
        let user = UserSnapshot::try_from(record("u", &[Provider::Google])).unwrap();

        let next = user.after_log_out();

        assert_eq!(next.state(), UserState::LoggedOut);
        assert_eq!(next.access_token(), None);
        assert_eq!(next.identities(), user.identities());
    }

    #[test]
    fn test_after_log_out_removed_stays_removed() {
        let mut raw = record("u", &[Provider::Google]);
        raw.state = STATE_REMOVED;
        let removed = UserSnapshot::try_from(raw).unwrap();

        assert_eq!(removed.after_log_out().state(), UserState::Removed);
    }
}
