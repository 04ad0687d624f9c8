//! Connector configuration.

use serde::Deserialize;

use crate::auth::AUTHENTICATION_TOKEN_COOKIE;

/// Settings for an [`HttpConnector`](crate::HttpConnector).
///
/// Deserializable so it can be loaded alongside the rest of an application's
/// settings; any missing field takes its default.
///
/// # Example
///
/// ```ignore
/// let config: ConnectorConfig = serde_json::from_str(r#"{ "base_url": "https://api.example.com/" }"#)?;
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Prefix for every model route, normally ending with `/`.
    pub base_url: String,
    /// Register the connector as the active instance on connect.
    pub global: bool,
    /// Attach the cross-origin directive to every request.
    pub cors: bool,
    /// Name of the cookie holding the session token.
    pub auth_cookie: String,
    /// Environment variable holding the raw cookie string.
    pub cookie_env: String,
    /// Expose response bodies as incremental streams.
    pub incremental: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            global: true,
            cors: true,
            auth_cookie: AUTHENTICATION_TOKEN_COOKIE.to_string(),
            cookie_env: "HTTP_COOKIE".to_string(),
            incremental: true,
        }
    }
}

impl ConnectorConfig {
    /// Default settings against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn with_cors(mut self, cors: bool) -> Self {
        self.cors = cors;
        self
    }

    pub fn with_auth_cookie(mut self, name: impl Into<String>) -> Self {
        self.auth_cookie = name.into();
        self
    }

    pub fn with_cookie_env(mut self, var: impl Into<String>) -> Self {
        self.cookie_env = var.into();
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }
}
