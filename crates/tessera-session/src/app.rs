//! The app context: one backend app, its sessions, and its worker pool.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tessera_dispatch::{Dispatcher, TaskHandle};
use tessera_gateway::{RawReply, RemoteError, RemoteGateway, RemoteOperation, RemoteRequest};
use tessera_protocol::{Codec, Credentials, JsonCodec, ProtocolError, UserRecord};
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;
use crate::user::SessionCell;
use crate::{AppConfig, AuthListener, User, UserError, UserState, translate};

struct AppInner {
    config: AppConfig,
    gateway: Arc<dyn RemoteGateway>,
    codec: JsonCodec,
    dispatcher: Dispatcher,
    registry: Mutex<SessionRegistry>,
    listeners: RwLock<Vec<Arc<dyn AuthListener>>>,
}

/// A client for one backend application.
///
/// The app owns everything its users share: the gateway that reaches the
/// backend, the worker pool that runs `_async` operations, and the
/// registry of known sessions. It is a cheap, clonable handle; clones are
/// the same app (`==` compares identity, not configuration).
///
/// Create one with [`App::builder`].
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    /// Starts building an app with the given backend app id.
    pub fn builder(app_id: impl Into<String>) -> AppBuilder {
        AppBuilder::new(AppConfig::new(app_id))
    }

    pub fn id(&self) -> &str {
        &self.inner.config.app_id
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    /// Logs in with `credentials`, blocking for the remote call.
    ///
    /// The new session is registered with the app and becomes the
    /// [`current_user`](Self::current_user). Logging in as a user the app
    /// already knows (say, one that logged out earlier) revives that
    /// session, so existing handles to it see the new state.
    ///
    /// # Errors
    /// [`UserError::Remote`] if the backend rejects the credentials;
    /// [`UserError::Protocol`] if its reply is malformed or describes a
    /// session that isn't logged in.
    pub fn log_in(&self, credentials: &Credentials) -> Result<User, UserError> {
        let payload = self.encode(credentials)?;
        let outcome = self.invoke(RemoteOperation::LogIn, None, &payload);
        let snapshot = translate::user_snapshot(&self.inner.codec, outcome)?;
        if !snapshot.state().is_logged_in() {
            // A login reply must describe a logged-in session.
            return Err(ProtocolError::InvalidField {
                field: "state",
                value: snapshot.state().to_string(),
            }
            .into());
        }

        let cell = self.inner.registry.lock().register(snapshot);
        let user = User::new(cell, self.clone());

        info!(
            app_id = self.id(),
            user_id = %user.id(),
            provider = %credentials.provider(),
            "user logged in"
        );
        self.notify(|listener| listener.logged_in(&user));
        Ok(user)
    }

    /// [`log_in`](Self::log_in) on the worker pool; the result arrives on
    /// this thread's event loop.
    ///
    /// # Errors
    /// Fails synchronously if this thread has no event loop or the app has
    /// been shut down.
    pub fn log_in_async<C>(
        &self,
        credentials: Credentials,
        callback: C,
    ) -> Result<TaskHandle, UserError>
    where
        C: FnOnce(Result<User, UserError>) + Send + 'static,
    {
        let app = self.clone();
        let task = self
            .inner
            .dispatcher
            .dispatch(move || app.log_in(&credentials), callback)?;
        Ok(task)
    }

    // -----------------------------------------------------------------------
    // Registry queries
    // -----------------------------------------------------------------------

    /// The most recently logged-in user that is still logged in.
    pub fn current_user(&self) -> Option<User> {
        let cell = self.inner.registry.lock().current()?;
        Some(User::new(cell, self.clone()))
    }

    /// Every user the app knows about (logged in or logged out), keyed by
    /// id. Removed users are not included.
    pub fn all_users(&self) -> HashMap<String, User> {
        let cells = self.inner.registry.lock().all();
        cells
            .into_iter()
            .map(|cell| {
                let user = User::new(cell, self.clone());
                (user.id(), user)
            })
            .collect()
    }

    /// A handle to a known user, if the app has it.
    pub fn user(&self, user_id: &str) -> Option<User> {
        let cell = self.inner.registry.lock().get(user_id)?;
        Some(User::new(cell, self.clone()))
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Removes `user` from this app.
    ///
    /// The backend is told first. Once it agrees, the session becomes
    /// `Removed`, its tokens are cleared, and it's no longer listed by
    /// [`all_users`](Self::all_users). Removing an already removed user is
    /// a no-op.
    ///
    /// # Errors
    /// - [`UserError::IllegalState`] if `user` belongs to another app.
    /// - [`UserError::Remote`] if the backend refuses; nothing changes.
    pub fn remove_user(&self, user: &User) -> Result<User, UserError> {
        if user.app() != self {
            return Err(UserError::IllegalState(
                "user belongs to a different app".to_string(),
            ));
        }
        let before = user.snapshot();
        if before.state() == UserState::Removed {
            return Ok(user.clone());
        }

        let outcome = self.invoke(RemoteOperation::RemoveUser, Some(before.record()), &[]);
        translate::unit(outcome)?;

        let after = user.cell().update(|current| Ok(current.after_remove()))?;
        self.forget(user.cell());

        info!(app_id = self.id(), user_id = after.id(), "user removed");
        self.notify(|listener| listener.removed(user));
        Ok(user.clone())
    }

    /// [`remove_user`](Self::remove_user) on the worker pool.
    ///
    /// # Errors
    /// Fails synchronously if this thread has no event loop.
    pub fn remove_user_async<C>(
        &self,
        user: &User,
        callback: C,
    ) -> Result<TaskHandle, UserError>
    where
        C: FnOnce(Result<User, UserError>) + Send + 'static,
    {
        let app = self.clone();
        let user = user.clone();
        let task = self
            .inner
            .dispatcher
            .dispatch(move || app.remove_user(&user), callback)?;
        Ok(task)
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    pub fn add_auth_listener(&self, listener: Arc<dyn AuthListener>) {
        self.inner.listeners.write().push(listener);
    }

    /// Returns `true` if `listener` was registered.
    pub fn remove_auth_listener(&self, listener: &Arc<dyn AuthListener>) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Stops the worker pool, waiting up to `timeout` for in-flight
    /// operations. Later `_async` calls fail with a dispatch error; the
    /// blocking forms keep working.
    pub fn shutdown(&self, timeout: Duration) {
        info!(app_id = self.id(), "shutting down worker pool");
        self.inner.dispatcher.shutdown(timeout);
    }

    // -----------------------------------------------------------------------
    // Crate-internal plumbing
    // -----------------------------------------------------------------------

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub(crate) fn codec(&self) -> &JsonCodec {
        &self.inner.codec
    }

    pub(crate) fn encode(&self, credentials: &Credentials) -> Result<Vec<u8>, UserError> {
        Ok(self.inner.codec.encode(credentials)?)
    }

    /// Sends one request through the gateway. No locks are held here.
    pub(crate) fn invoke(
        &self,
        operation: RemoteOperation,
        session: Option<&UserRecord>,
        payload: &[u8],
    ) -> Result<RawReply, RemoteError> {
        debug!(
            operation = %operation,
            app_id = self.id(),
            user_id = session.map(|s| s.id.as_str()),
            "invoking remote operation"
        );

        let outcome = self.inner.gateway.invoke(RemoteRequest {
            operation,
            app_id: self.id(),
            session,
            payload,
        });

        if let Err(err) = &outcome {
            warn!(
                operation = %operation,
                code = err.code,
                error = %err.message,
                "remote operation failed"
            );
        }
        outcome
    }

    /// Drops a removed session from the registry.
    pub(crate) fn forget(&self, cell: &Arc<SessionCell>) {
        if self.inner.registry.lock().remove(cell) {
            debug!(user_id = cell.load().id(), "session deregistered");
        }
    }

    /// Calls `event` on every listener. The list is copied first so a
    /// listener may add or remove listeners.
    pub(crate) fn notify(&self, event: impl Fn(&dyn AuthListener)) {
        let listeners = self.inner.listeners.read().clone();
        for listener in &listeners {
            event(listener.as_ref());
        }
    }
}

impl PartialEq for App {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for App {}

impl Hash for App {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("app_id", &self.id())
            .field("sessions", &self.inner.registry.lock().len())
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AppBuilder
// ---------------------------------------------------------------------------

/// Builder for [`App`].
///
/// ```
/// use std::sync::Arc;
/// use tessera_gateway::InMemoryBackend;
/// use tessera_session::App;
///
/// let app = App::builder("notes-app")
///     .worker_threads(2)
///     .gateway(Arc::new(InMemoryBackend::new()))
///     .build()
///     .unwrap();
///
/// assert_eq!(app.id(), "notes-app");
/// assert!(app.current_user().is_none());
/// ```
pub struct AppBuilder {
    config: AppConfig,
    gateway: Option<Arc<dyn RemoteGateway>>,
    listeners: Vec<Arc<dyn AuthListener>>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            gateway: None,
            listeners: Vec::new(),
        }
    }

    /// Replaces the whole configuration (app id included).
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn worker_threads(mut self, n: usize) -> Self {
        self.config.dispatch.worker_threads = n;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.dispatch.thread_name = name.into();
        self
    }

    /// The gateway every remote operation goes through. Required.
    pub fn gateway(mut self, gateway: Arc<dyn RemoteGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn AuthListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validates the configuration and starts the worker pool.
    ///
    /// # Errors
    /// - [`UserError::InvalidConfig`] for a bad app id or a missing gateway.
    /// - [`UserError::Dispatch`] if the worker pool can't start.
    pub fn build(self) -> Result<App, UserError> {
        self.config.validate()?;
        let gateway = self
            .gateway
            .ok_or_else(|| UserError::InvalidConfig("a remote gateway is required".into()))?;

        let dispatcher = Dispatcher::new(self.config.dispatch.clone())?;
        let config = AppConfig {
            dispatch: dispatcher.config().clone(),
            ..self.config
        };

        info!(
            app_id = %config.app_id,
            workers = config.dispatch.worker_threads,
            "app created"
        );

        Ok(App {
            inner: Arc::new(AppInner {
                config,
                gateway,
                codec: JsonCodec,
                dispatcher,
                registry: Mutex::new(SessionRegistry::new()),
                listeners: RwLock::new(self.listeners),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_gateway::InMemoryBackend;
    use tessera_protocol::Provider;

    fn app() -> (App, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        let app = App::builder("test-app")
            .worker_threads(1)
            .gateway(backend.clone())
            .build()
            .unwrap();
        (app, backend)
    }

    #[test]
    fn test_build_without_gateway_fails() {
        let result = App::builder("a1").build();

        assert!(matches!(result, Err(UserError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_empty_app_id_fails() {
        let result = App::builder("")
            .gateway(Arc::new(InMemoryBackend::new()))
            .build();

        assert!(matches!(result, Err(UserError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_clamps_worker_threads() {
        let app = App::builder("a1")
            .worker_threads(0)
            .gateway(Arc::new(InMemoryBackend::new()))
            .build()
            .unwrap();

        assert_eq!(app.config().dispatch.worker_threads, 1);
    }

    #[test]
    fn test_log_in_registers_current_user() {
        let (app, backend) = app();

        let user = app.log_in(&Credentials::anonymous()).unwrap();

        assert_eq!(backend.calls(RemoteOperation::LogIn), 1);
        assert_eq!(user.state(), UserState::LoggedIn);
        assert_eq!(user.identities()[0].provider, Provider::Anonymous);
        assert_eq!(app.current_user(), Some(user.clone()));
        assert_eq!(app.all_users().len(), 1);
    }

    #[test]
    fn test_app_equality_is_identity() {
        let (a, _) = app();
        let (b, _) = app();

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_user_from_other_app_is_illegal() {
        let (a, _) = app();
        let (b, backend_b) = app();
        let user = a.log_in(&Credentials::anonymous()).unwrap();

        let err = b.remove_user(&user).unwrap_err();

        assert!(err.is_usage());
        assert_eq!(backend_b.calls(RemoteOperation::RemoveUser), 0);
    }

    #[test]
    fn test_remove_listener() {
        struct Quiet;
        impl AuthListener for Quiet {}

        let (app, _) = app();
        let listener: Arc<dyn AuthListener> = Arc::new(Quiet);
        app.add_auth_listener(listener.clone());

        assert!(app.remove_auth_listener(&listener));
        assert!(!app.remove_auth_listener(&listener));
    }
}
