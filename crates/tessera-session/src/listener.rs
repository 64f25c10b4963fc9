//! Hooks for observing session changes.

use crate::User;

/// Receives session lifecycle notifications from an [`App`](crate::App).
///
/// Callbacks run on whichever thread finished the operation: the caller
/// for blocking calls, a pool worker for `_async` ones. Keep them short,
/// and don't call back into the same `App` in a way that waits on another
/// notification.
///
/// All methods default to doing nothing, so implement only what you need.
///
/// ```
/// use tessera_session::{AuthListener, User};
///
/// struct Audit;
///
/// impl AuthListener for Audit {
///     fn logged_out(&self, user: &User) {
///         println!("{} is now {}", user.id(), user.state());
///     }
/// }
/// ```
pub trait AuthListener: Send + Sync + 'static {
    /// A login succeeded.
    fn logged_in(&self, _user: &User) {}

    /// A logout succeeded. The user is now `LoggedOut`, or `Removed` if
    /// it only had anonymous identities.
    fn logged_out(&self, _user: &User) {}

    /// The user was removed from the app.
    fn removed(&self, _user: &User) {}
}
