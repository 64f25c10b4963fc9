//! A complete backend that lives in process memory.
//!
//! `InMemoryBackend` implements [`RemoteGateway`] with the same rules the
//! real service enforces, so the session layer can be exercised end to
//! end without a network:
//!
//! - Every anonymous login creates a brand-new user.
//! - Any other credential is an *account* keyed by `(provider, subject)`.
//!   The first login with an unknown account creates its user; later
//!   logins return the same user. Email/password accounts remember the
//!   password they were created with.
//! - Linking attaches a new account to an existing user, unless that
//!   account already belongs to someone (`CREDENTIAL_IN_USE`).
//! - Every successful login or link issues fresh access/refresh tokens.
//!
//! Tests can inject failures with [`InMemoryBackend::fail_next`] and count
//! invocations with [`InMemoryBackend::calls`].

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use rand::Rng;
use tessera_protocol::{
    Codec, Credentials, IdentityRecord, JsonCodec, ProfileRecord, Provider,
    UserRecord, STATE_LOGGED_IN, STATE_LOGGED_OUT, STATE_REMOVED,
};
use tracing::debug;

use crate::{RawReply, RemoteError, RemoteGateway, RemoteOperation, RemoteRequest};

/// Everything the backend knows, behind one lock.
#[derive(Default)]
struct BackendState {
    /// Users keyed by user id.
    users: HashMap<String, UserRecord>,
    /// `(provider, subject)` → owning user id.
    accounts: HashMap<(Provider, String), String>,
    /// Email → password, for email/password accounts.
    passwords: HashMap<String, String>,
    /// Queued failures per operation, consumed front to back.
    failures: HashMap<RemoteOperation, VecDeque<RemoteError>>,
    /// Invocation counts per operation (failed calls included).
    calls: HashMap<RemoteOperation, usize>,
    next_user: u64,
    next_identity: u64,
}

/// An in-process [`RemoteGateway`] for tests and demos.
///
/// Share it between the app and the test with an `Arc`; the gateway trait
/// is implemented for `Arc<G>`.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    codec: JsonCodec,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call to `operation` fail with `error`.
    ///
    /// Calls queue up: two `fail_next` calls fail the next two invocations.
    pub fn fail_next(&self, operation: RemoteOperation, error: RemoteError) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// How many times `operation` has been invoked, including failures.
    pub fn calls(&self, operation: RemoteOperation) -> usize {
        self.state.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Total invocations across all operations.
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    /// The backend's current record for a user, if it exists.
    pub fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.state.lock().users.get(user_id).cloned()
    }

    /// Replaces a user's profile. The next login or link reply carries it.
    pub fn set_profile(&self, user_id: &str, profile: ProfileRecord) -> bool {
        match self.state.lock().users.get_mut(user_id) {
            Some(user) => {
                user.profile = profile;
                true
            }
            None => false,
        }
    }

    fn log_in(
        &self,
        state: &mut BackendState,
        creds: &Credentials,
    ) -> Result<RawReply, RemoteError> {
        let user_id = match subject_of(creds) {
            None => create_user(state, creds),
            Some(subject) => {
                let key = (creds.provider(), subject);
                match state.accounts.get(&key).cloned() {
                    Some(user_id) => {
                        check_password(state, creds)?;
                        user_id
                    }
                    None => {
                        let user_id = create_user(state, creds);
                        remember_password(state, creds);
                        state.accounts.insert(key, user_id.clone());
                        user_id
                    }
                }
            }
        };

        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| RemoteError::new(RemoteError::USER_NOT_FOUND, user_id.clone()))?;
        user.state = STATE_LOGGED_IN;
        issue_tokens(user);
        self.encode_reply(user)
    }

    fn link(
        &self,
        state: &mut BackendState,
        session: &UserRecord,
        creds: &Credentials,
    ) -> Result<RawReply, RemoteError> {
        authorize(state, session)?;

        let Some(subject) = subject_of(creds) else {
            return Err(RemoteError::new(
                RemoteError::UNSUPPORTED_OPERATION,
                "anonymous credentials can't be linked",
            ));
        };
        let key = (creds.provider(), subject);
        if let Some(owner) = state.accounts.get(&key) {
            if owner != &session.id {
                return Err(RemoteError::new(
                    RemoteError::CREDENTIAL_IN_USE,
                    format!("{} credentials already belong to another user", creds.provider()),
                ));
            }
        }

        let identity = next_identity(state, creds.provider());
        remember_password(state, creds);
        state.accounts.insert(key, session.id.clone());

        let user = state
            .users
            .get_mut(&session.id)
            .ok_or_else(|| RemoteError::new(RemoteError::USER_NOT_FOUND, session.id.clone()))?;
        user.identities.push(identity);
        if user.profile.email.is_none() {
            user.profile.email = creds.field("email").map(str::to_string);
        }
        issue_tokens(user);
        self.encode_reply(user)
    }

    fn encode_reply(&self, user: &UserRecord) -> Result<RawReply, RemoteError> {
        self.codec
            .encode(user)
            .map(RawReply::new)
            .map_err(|e| RemoteError::new(RemoteError::BAD_REQUEST, e.to_string()))
    }
}

impl RemoteGateway for InMemoryBackend {
    fn invoke(&self, request: RemoteRequest<'_>) -> Result<RawReply, RemoteError> {
        let mut state = self.state.lock();
        *state.calls.entry(request.operation).or_insert(0) += 1;

        debug!(
            operation = %request.operation,
            app_id = request.app_id,
            user_id = request.session.map(|s| s.id.as_str()),
            "in-memory backend invoked"
        );

        if let Some(err) = state
            .failures
            .get_mut(&request.operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        match request.operation {
            RemoteOperation::LogIn => {
                let creds = self.decode_credentials(request.payload)?;
                self.log_in(&mut state, &creds)
            }
            RemoteOperation::LinkCredentials => {
                let session = require_session(request)?;
                let creds = self.decode_credentials(request.payload)?;
                self.link(&mut state, session, &creds)
            }
            RemoteOperation::LogOut => {
                // Logging out an unknown or already-logged-out user is fine.
                let session = require_session(request)?;
                if let Some(user) = state.users.get_mut(&session.id) {
                    if user.state == STATE_LOGGED_IN {
                        user.state = STATE_LOGGED_OUT;
                    }
                    user.access_token.clear();
                    user.refresh_token.clear();
                }
                Ok(RawReply::empty())
            }
            RemoteOperation::RemoveUser => {
                let session = require_session(request)?;
                let user = state.users.get_mut(&session.id).ok_or_else(|| {
                    RemoteError::new(RemoteError::USER_NOT_FOUND, session.id.clone())
                })?;
                user.state = STATE_REMOVED;
                user.access_token.clear();
                user.refresh_token.clear();
                Ok(RawReply::empty())
            }
        }
    }
}

impl InMemoryBackend {
    fn decode_credentials(&self, payload: &[u8]) -> Result<Credentials, RemoteError> {
        self.codec
            .decode(payload)
            .map_err(|e| RemoteError::new(RemoteError::BAD_REQUEST, e.to_string()))
    }
}

fn require_session<'a>(request: RemoteRequest<'a>) -> Result<&'a UserRecord, RemoteError> {
    request.session.ok_or_else(|| {
        RemoteError::new(
            RemoteError::INVALID_SESSION,
            format!("{} requires a session", request.operation),
        )
    })
}

/// Checks that the session's access token is the one we last issued.
fn authorize(state: &BackendState, session: &UserRecord) -> Result<(), RemoteError> {
    let user = state
        .users
        .get(&session.id)
        .ok_or_else(|| RemoteError::new(RemoteError::USER_NOT_FOUND, session.id.clone()))?;
    if user.access_token.is_empty() || user.access_token != session.access_token {
        return Err(RemoteError::new(
            RemoteError::INVALID_SESSION,
            "access token is not valid",
        ));
    }
    Ok(())
}

/// What identifies an account at its provider. `None` for anonymous.
fn subject_of(creds: &Credentials) -> Option<String> {
    match creds.provider() {
        Provider::Anonymous => None,
        Provider::EmailPassword => creds.field("email").map(str::to_string),
        Provider::ApiKey => creds.field("key").map(str::to_string),
        Provider::CustomFunction => Some(
            creds
                .fields()
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&"),
        ),
        Provider::Jwt | Provider::Google | Provider::Facebook | Provider::Apple => {
            creds.field("token").map(str::to_string)
        }
    }
}

fn check_password(state: &BackendState, creds: &Credentials) -> Result<(), RemoteError> {
    if creds.provider() != Provider::EmailPassword {
        return Ok(());
    }
    let email = creds.field("email").unwrap_or_default();
    match state.passwords.get(email) {
        Some(stored) if Some(stored.as_str()) == creds.field("password") => Ok(()),
        _ => Err(RemoteError::new(
            RemoteError::INVALID_CREDENTIALS,
            "invalid username/password",
        )),
    }
}

fn remember_password(state: &mut BackendState, creds: &Credentials) {
    if let (Provider::EmailPassword, Some(email), Some(password)) =
        (creds.provider(), creds.field("email"), creds.field("password"))
    {
        state
            .passwords
            .insert(email.to_string(), password.to_string());
    }
}

fn create_user(state: &mut BackendState, creds: &Credentials) -> String {
    state.next_user += 1;
    let user_id = format!("user-{}", state.next_user);
    let identity = next_identity(state, creds.provider());
    let record = UserRecord {
        id: user_id.clone(),
        profile: ProfileRecord {
            email: creds.field("email").map(str::to_string),
            ..ProfileRecord::default()
        },
        identities: vec![identity],
        access_token: String::new(),
        refresh_token: String::new(),
        state: STATE_LOGGED_IN,
        user_type: "normal".to_string(),
    };
    state.users.insert(user_id.clone(), record);
    debug!(%user_id, provider = %creds.provider(), "in-memory user created");
    user_id
}

fn next_identity(state: &mut BackendState, provider: Provider) -> IdentityRecord {
    state.next_identity += 1;
    IdentityRecord {
        id: format!("ident-{}", state.next_identity),
        provider,
    }
}

fn issue_tokens(user: &mut UserRecord) {
    user.access_token = generate_token();
    user.refresh_token = generate_token();
}

/// 128 random bits as 32 lowercase hex characters.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        operation: RemoteOperation,
        session: Option<&'a UserRecord>,
        payload: &'a [u8],
    ) -> RemoteRequest<'a> {
        RemoteRequest {
            operation,
            app_id: "test-app",
            session,
            payload,
        }
    }

    fn log_in(backend: &InMemoryBackend, creds: &Credentials) -> Result<UserRecord, RemoteError> {
        let payload = JsonCodec.encode(creds).unwrap();
        let reply = backend.invoke(request(RemoteOperation::LogIn, None, &payload))?;
        Ok(JsonCodec.decode(reply.as_bytes()).unwrap())
    }

    #[test]
    fn test_log_in_anonymous_creates_new_user_each_time() {
        let backend = InMemoryBackend::new();

        let a = log_in(&backend, &Credentials::anonymous()).unwrap();
        let b = log_in(&backend, &Credentials::anonymous()).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.identities.len(), 1);
        assert_eq!(a.identities[0].provider, Provider::Anonymous);
        assert_eq!(a.access_token.len(), 32);
    }

    #[test]
    fn test_log_in_same_email_returns_same_user() {
        let backend = InMemoryBackend::new();
        let creds = Credentials::email_password("ana@example.com", "pw");

        let first = log_in(&backend, &creds).unwrap();
        let second = log_in(&backend, &creds).unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.access_token, second.access_token, "fresh tokens per login");
    }

    #[test]
    fn test_log_in_wrong_password_returns_invalid_credentials() {
        let backend = InMemoryBackend::new();
        log_in(&backend, &Credentials::email_password("ana@example.com", "pw")).unwrap();

        let err = log_in(&backend, &Credentials::email_password("ana@example.com", "nope"))
            .unwrap_err();

        assert_eq!(err.code, RemoteError::INVALID_CREDENTIALS);
    }

    #[test]
    fn test_link_appends_identity_and_rotates_tokens() {
        let backend = InMemoryBackend::new();
        let anon = log_in(&backend, &Credentials::anonymous()).unwrap();
        let payload = JsonCodec
            .encode(&Credentials::email_password("ana@example.com", "pw"))
            .unwrap();

        let reply = backend
            .invoke(request(RemoteOperation::LinkCredentials, Some(&anon), &payload))
            .unwrap();
        let linked: UserRecord = JsonCodec.decode(reply.as_bytes()).unwrap();

        assert_eq!(linked.id, anon.id);
        assert_eq!(linked.identities.len(), 2);
        assert_eq!(linked.identities[1].provider, Provider::EmailPassword);
        assert_ne!(linked.access_token, anon.access_token);
        assert_eq!(linked.profile.email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_link_credentials_owned_by_other_user_returns_in_use() {
        let backend = InMemoryBackend::new();
        log_in(&backend, &Credentials::api_key("k-1")).unwrap();
        let anon = log_in(&backend, &Credentials::anonymous()).unwrap();
        let payload = JsonCodec.encode(&Credentials::api_key("k-1")).unwrap();

        let err = backend
            .invoke(request(RemoteOperation::LinkCredentials, Some(&anon), &payload))
            .unwrap_err();

        assert_eq!(err.code, RemoteError::CREDENTIAL_IN_USE);
    }

    #[test]
    fn test_link_with_stale_token_returns_invalid_session() {
        let backend = InMemoryBackend::new();
        let mut anon = log_in(&backend, &Credentials::anonymous()).unwrap();
        anon.access_token = "stale".into();
        let payload = JsonCodec.encode(&Credentials::jwt("t")).unwrap();

        let err = backend
            .invoke(request(RemoteOperation::LinkCredentials, Some(&anon), &payload))
            .unwrap_err();

        assert_eq!(err.code, RemoteError::INVALID_SESSION);
    }

    #[test]
    fn test_log_out_twice_succeeds_both_times() {
        let backend = InMemoryBackend::new();
        let user = log_in(&backend, &Credentials::api_key("k")).unwrap();

        backend
            .invoke(request(RemoteOperation::LogOut, Some(&user), &[]))
            .unwrap();
        backend
            .invoke(request(RemoteOperation::LogOut, Some(&user), &[]))
            .unwrap();

        let stored = backend.user(&user.id).unwrap();
        assert_eq!(stored.state, STATE_LOGGED_OUT);
        assert!(stored.access_token.is_empty());
    }

    #[test]
    fn test_fail_next_is_consumed_once_and_counted() {
        let backend = InMemoryBackend::new();
        backend.fail_next(
            RemoteOperation::LogIn,
            RemoteError::new(RemoteError::NETWORK_UNAVAILABLE, "offline"),
        );

        let first = log_in(&backend, &Credentials::anonymous());
        let second = log_in(&backend, &Credentials::anonymous());

        assert_eq!(first.unwrap_err().code, RemoteError::NETWORK_UNAVAILABLE);
        assert!(second.is_ok());
        assert_eq!(backend.calls(RemoteOperation::LogIn), 2);
        assert_eq!(backend.total_calls(), 2);
    }

    #[test]
    fn test_garbage_payload_returns_bad_request() {
        let backend = InMemoryBackend::new();

        let err = backend
            .invoke(request(RemoteOperation::LogIn, None, b"{"))
            .unwrap_err();

        assert_eq!(err.code, RemoteError::BAD_REQUEST);
    }
}
