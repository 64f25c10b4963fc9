//! Provider-tagged login material.
//!
//! The SDK never looks inside credentials. It only needs to know which
//! provider they belong to (so anonymous sessions can be told apart from
//! real accounts) and how to hand them to the gateway as bytes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// The authentication provider a credential or linked identity belongs to.
///
/// Serialized in kebab-case to match the backend's provider names:
/// `Provider::EmailPassword` travels as `"email-password"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Anonymous,
    EmailPassword,
    ApiKey,
    Jwt,
    Google,
    Facebook,
    Apple,
    CustomFunction,
}

impl Provider {
    /// The provider's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::EmailPassword => "email-password",
            Self::ApiKey => "api-key",
            Self::Jwt => "jwt",
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Apple => "apple",
            Self::CustomFunction => "custom-function",
        }
    }

    /// Returns `true` for the anonymous provider.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Opaque credentials for logging in or linking.
///
/// Values are kept as plain strings keyed by field name. `Debug` redacts
/// them so passwords and tokens don't end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    provider: Provider,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, String>,
}

impl Credentials {
    /// Builds credentials from a provider and raw fields.
    pub fn new<K, V>(
        provider: Provider,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            provider,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Anonymous credentials. Carry no fields.
    pub fn anonymous() -> Self {
        Self {
            provider: Provider::Anonymous,
            fields: BTreeMap::new(),
        }
    }

    pub fn email_password(email: &str, password: &str) -> Self {
        Self::new(
            Provider::EmailPassword,
            [("email", email), ("password", password)],
        )
    }

    pub fn api_key(key: &str) -> Self {
        Self::new(Provider::ApiKey, [("key", key)])
    }

    pub fn jwt(token: &str) -> Self {
        Self::new(Provider::Jwt, [("token", token)])
    }

    /// Google OAuth, identified by the ID token the Google SDK returned.
    pub fn google(id_token: &str) -> Self {
        Self::new(Provider::Google, [("token", id_token)])
    }

    pub fn facebook(access_token: &str) -> Self {
        Self::new(Provider::Facebook, [("token", access_token)])
    }

    pub fn apple(id_token: &str) -> Self {
        Self::new(Provider::Apple, [("token", id_token)])
    }

    /// Arguments forwarded verbatim to a backend-side auth function.
    pub fn custom_function<K, V>(args: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(Provider::CustomFunction, args)
    }

    /// The provider these credentials belong to.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Looks up a single field, e.g. `"email"`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// All fields, ordered by name.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_password_keeps_both_fields() {
        let creds = Credentials::email_password("ana@example.com", "pw");

        assert_eq!(creds.provider(), Provider::EmailPassword);
        assert_eq!(creds.field("email"), Some("ana@example.com"));
        assert_eq!(creds.field("password"), Some("pw"));
    }

    #[test]
    fn test_anonymous_has_no_fields() {
        let creds = Credentials::anonymous();

        assert!(creds.provider().is_anonymous());
        assert!(creds.fields().is_empty());
    }

    #[test]
    fn test_debug_redacts_values() {
        let creds = Credentials::email_password("ana@example.com", "hunter2");

        let printed = format!("{creds:?}");

        assert!(printed.contains("email"));
        assert!(!printed.contains("hunter2"), "password leaked: {printed}");
    }

    #[test]
    fn test_provider_display_matches_wire_name() {
        assert_eq!(Provider::EmailPassword.to_string(), "email-password");
        assert_eq!(Provider::CustomFunction.to_string(), "custom-function");
        assert_eq!(Provider::Anonymous.to_string(), "anonymous");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_provider_serializes_as_kebab_case() {
        let json = serde_json::to_string(&Provider::ApiKey).unwrap();
        assert_eq!(json, "\"api-key\"");
    }
}
