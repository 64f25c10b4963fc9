//! The user handle: a cheap, shareable reference to one session.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use tessera_dispatch::TaskHandle;
use tessera_gateway::RemoteOperation;
use tessera_protocol::Credentials;
use tracing::info;

use crate::{App, UserError, UserIdentity, UserSnapshot, UserState, UserType, translate};

// ---------------------------------------------------------------------------
// SessionCell
// ---------------------------------------------------------------------------

/// The one mutable slot behind a session.
///
/// Every `User` handle for the same session shares one cell. Readers
/// clone the current `Arc<UserSnapshot>` and work from that; writers build
/// a whole new snapshot and swap it in. The lock is held only for the
/// swap, never across a remote call.
pub(crate) struct SessionCell {
    current: RwLock<Arc<UserSnapshot>>,
}

impl SessionCell {
    pub(crate) fn new(snapshot: UserSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub(crate) fn load(&self) -> Arc<UserSnapshot> {
        self.current.read().clone()
    }

    pub(crate) fn replace(&self, next: UserSnapshot) -> Arc<UserSnapshot> {
        let next = Arc::new(next);
        *self.current.write() = Arc::clone(&next);
        next
    }

    /// Computes the next snapshot from the current one and installs it,
    /// atomically with respect to other writers.
    ///
    /// If `f` fails the cell is left untouched.
    pub(crate) fn update<F>(&self, f: F) -> Result<Arc<UserSnapshot>, UserError>
    where
        F: FnOnce(&UserSnapshot) -> Result<UserSnapshot, UserError>,
    {
        let mut slot = self.current.write();
        let next = f(&slot)?;
        debug_assert!(slot.state().can_transition_to(next.state()));
        let next = Arc::new(next);
        *slot = Arc::clone(&next);
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A handle to one user session of an [`App`].
///
/// Cloning is cheap and every clone sees the same session: after
/// `a.link_user(..)`, `b.identities()` shows the new identity too.
/// Accessors read the latest snapshot; to read several fields
/// consistently, take one [`snapshot`](Self::snapshot) and read from it.
///
/// # Equality
///
/// Two handles are equal when their current snapshots are equal and they
/// belong to the same app. `Hash` agrees with `Eq`, but since it follows
/// the snapshot it changes when the session does; don't keep a `User` as
/// a hash-map key across operations that mutate it.
#[derive(Clone)]
pub struct User {
    cell: Arc<SessionCell>,
    app: App,
}

impl User {
    pub(crate) fn new(cell: Arc<SessionCell>, app: App) -> Self {
        Self { cell, app }
    }

    pub(crate) fn cell(&self) -> &Arc<SessionCell> {
        &self.cell
    }

    /// The current snapshot. It won't change under you.
    pub fn snapshot(&self) -> Arc<UserSnapshot> {
        self.cell.load()
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn id(&self) -> String {
        self.snapshot().id().to_string()
    }

    pub fn state(&self) -> UserState {
        self.snapshot().state()
    }

    pub fn user_type(&self) -> UserType {
        self.snapshot().user_type()
    }

    pub fn identities(&self) -> Vec<UserIdentity> {
        self.snapshot().identities().to_vec()
    }

    pub fn access_token(&self) -> Option<String> {
        self.snapshot().access_token().map(str::to_string)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.snapshot().refresh_token().map(str::to_string)
    }

    pub fn name(&self) -> Option<String> {
        self.snapshot().name().map(str::to_string)
    }

    pub fn email(&self) -> Option<String> {
        self.snapshot().email().map(str::to_string)
    }

    pub fn picture_url(&self) -> Option<String> {
        self.snapshot().picture_url().map(str::to_string)
    }

    pub fn first_name(&self) -> Option<String> {
        self.snapshot().first_name().map(str::to_string)
    }

    pub fn last_name(&self) -> Option<String> {
        self.snapshot().last_name().map(str::to_string)
    }

    pub fn gender(&self) -> Option<String> {
        self.snapshot().gender().map(str::to_string)
    }

    pub fn birthday(&self) -> Option<String> {
        self.snapshot().birthday().map(str::to_string)
    }

    pub fn min_age(&self) -> Option<i64> {
        self.snapshot().min_age()
    }

    pub fn max_age(&self) -> Option<i64> {
        self.snapshot().max_age()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state().is_logged_in()
    }

    pub fn is_anonymous(&self) -> bool {
        self.snapshot().is_anonymous()
    }

    // -----------------------------------------------------------------------
    // Linking
    // -----------------------------------------------------------------------

    /// Attaches `credentials` to this user as an additional identity.
    ///
    /// Blocks for the duration of the remote call. On success the session
    /// holds the backend's refreshed snapshot (new identity list, new
    /// tokens, same id) and `self` is returned for chaining.
    ///
    /// # Errors
    /// - [`UserError::IllegalState`] if the user isn't logged in. No
    ///   remote call is made.
    /// - [`UserError::Remote`] if the backend refuses (credential already
    ///   in use, invalid credential, ...). The session is unchanged.
    /// - [`UserError::Protocol`] if the reply can't be decoded or names a
    ///   different user. The session is unchanged.
    pub fn link_user(&self, credentials: &Credentials) -> Result<User, UserError> {
        let before = self.snapshot();
        if !before.state().is_logged_in() {
            return Err(UserError::not_logged_in());
        }

        let payload = self.app.encode(credentials)?;
        let outcome = self.app.invoke(
            RemoteOperation::LinkCredentials,
            Some(before.record()),
            &payload,
        );
        let refreshed = translate::user_snapshot(self.app.codec(), outcome)?;
        let refreshed = translate::same_user(&before, refreshed)?;

        // A logout may have landed while the call was in flight.
        let installed = self.cell.update(|current| {
            if current.state().is_logged_in() {
                Ok(refreshed)
            } else {
                Err(UserError::not_logged_in())
            }
        })?;

        info!(
            user_id = installed.id(),
            provider = %credentials.provider(),
            identities = installed.identities().len(),
            "credentials linked"
        );
        Ok(self.clone())
    }

    /// [`link_user`](Self::link_user) on the app's worker pool.
    ///
    /// `callback` runs exactly once on this thread's
    /// [`EventLoop`](tessera_dispatch::EventLoop), unless the returned
    /// task is cancelled first.
    ///
    /// # Errors
    /// Fails synchronously, without scheduling anything, if the user isn't
    /// logged in or this thread has no event loop.
    pub fn link_user_async<C>(
        &self,
        credentials: Credentials,
        callback: C,
    ) -> Result<TaskHandle, UserError>
    where
        C: FnOnce(Result<User, UserError>) + Send + 'static,
    {
        if !self.is_logged_in() {
            return Err(UserError::not_logged_in());
        }
        let user = self.clone();
        let task = self
            .app
            .dispatcher()
            .dispatch(move || user.link_user(&credentials), callback)?;
        Ok(task)
    }

    // -----------------------------------------------------------------------
    // Logout
    // -----------------------------------------------------------------------

    /// Ends this session.
    ///
    /// The backend is always asked first; if it refuses, nothing changes
    /// locally. On success:
    ///
    /// - a user whose identities are all anonymous becomes `Removed` and
    ///   disappears from [`App::all_users`], since it could never log in
    ///   again;
    /// - anyone else becomes `LoggedOut` and stays listed;
    /// - tokens are cleared either way.
    ///
    /// Logging out a `LoggedOut` user is allowed and leaves it `LoggedOut`.
    pub fn log_out(&self) -> Result<User, UserError> {
        let before = self.snapshot();
        let outcome = self
            .app
            .invoke(RemoteOperation::LogOut, Some(before.record()), &[]);
        translate::unit(outcome)?;

        let after = self.cell.update(|current| Ok(current.after_log_out()))?;
        if after.state() == UserState::Removed {
            self.app.forget(&self.cell);
        }

        info!(user_id = after.id(), state = %after.state(), "user logged out");
        self.app.notify(|listener| listener.logged_out(self));
        Ok(self.clone())
    }

    /// [`log_out`](Self::log_out) on the app's worker pool.
    ///
    /// # Errors
    /// Fails synchronously if this thread has no event loop.
    pub fn log_out_async<C>(&self, callback: C) -> Result<TaskHandle, UserError>
    where
        C: FnOnce(Result<User, UserError>) + Send + 'static,
    {
        let user = self.clone();
        let task = self
            .app
            .dispatcher()
            .dispatch(move || user.log_out(), callback)?;
        Ok(task)
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.app == other.app && *self.snapshot() == *other.snapshot()
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.snapshot().hash(state);
        self.app.hash(state);
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("User")
            .field("id", &snapshot.id())
            .field("state", &snapshot.state())
            .field("identities", &snapshot.identities().len())
            .field("app", &self.app.id())
            .finish()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        write!(f, "{} ({})", snapshot.id(), snapshot.state())
    }
}
