//! App configuration.

use serde::{Deserialize, Serialize};
use tessera_dispatch::DispatchConfig;

use crate::UserError;

/// Settings for one [`App`](crate::App).
///
/// Deserializes from any serde format; `dispatch` may be omitted.
///
/// ```
/// use tessera_session::AppConfig;
///
/// let config = AppConfig::new("notes-app");
/// assert!(config.validate().is_ok());
/// assert!(AppConfig::new("").validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// The backend's id for this app. Sent with every remote call.
    pub app_id: String,

    /// Worker pool for `_async` operations.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl AppConfig {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            dispatch: DispatchConfig::default(),
        }
    }

    /// Checks the fields the backend can't live without.
    ///
    /// Unlike the pool settings, which are clamped, a bad app id can't be
    /// guessed, so it's an error.
    ///
    /// # Errors
    /// [`UserError::InvalidConfig`] for an empty or whitespace-containing
    /// app id.
    pub fn validate(&self) -> Result<(), UserError> {
        if self.app_id.is_empty() {
            return Err(UserError::InvalidConfig("app_id must not be empty".into()));
        }
        if self.app_id.chars().any(char::is_whitespace) {
            return Err(UserError::InvalidConfig(format!(
                "app_id must not contain whitespace: {:?}",
                self.app_id
            )));
        }
        Ok(())
    }
}
