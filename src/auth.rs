//! Authentication header sources.

use crate::types::Headers;

/// Default name of the cookie holding the session token.
pub const AUTHENTICATION_TOKEN_COOKIE: &str = "authentication_token";

/// Header carrying the bearer token.
pub const AUTHENTICATION_HEADER: &str = "authentication";

/// Supplies extra headers identifying the caller.
///
/// An empty result means "no credentials yet"; the connector asks again on
/// the next call until a non-empty set is returned.
pub trait AuthProvider: Send + Sync {
    fn headers(&self) -> Headers;
}

impl<T: AuthProvider + ?Sized> AuthProvider for std::sync::Arc<T> {
    fn headers(&self) -> Headers {
        (**self).headers()
    }
}

/// Provider that never adds headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuth;

impl AuthProvider for NoAuth {
    fn headers(&self) -> Headers {
        Headers::new()
    }
}

/// Provider returning a fixed header set.
#[derive(Clone, Debug, Default)]
pub struct StaticAuth(pub Headers);

impl StaticAuth {
    /// `authentication: Bearer <token>`.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self(bearer_headers(token.as_ref()))
    }
}

impl AuthProvider for StaticAuth {
    fn headers(&self) -> Headers {
        self.0.clone()
    }
}

type CookieSource = Box<dyn Fn() -> Option<String> + Send + Sync>;

/// Reads a bearer token from a named cookie.
pub struct CookieAuthProvider {
    cookie_name: String,
    source: CookieSource,
}

impl CookieAuthProvider {
    /// Read the raw cookie string from `source` on demand.
    pub fn new<F>(cookie_name: impl Into<String>, source: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        Self {
            cookie_name: cookie_name.into(),
            source: Box::new(source),
        }
    }

    /// Read the raw cookie string from an environment variable such as
    /// `HTTP_COOKIE`.
    pub fn from_env(cookie_name: impl Into<String>, var: impl Into<String>) -> Self {
        let var = var.into();
        Self::new(cookie_name, move || std::env::var(&var).ok())
    }
}

impl AuthProvider for CookieAuthProvider {
    fn headers(&self) -> Headers {
        (self.source)()
            .and_then(|cookies| pull_cookie_value(&cookies, &self.cookie_name))
            .filter(|token| !token.is_empty())
            .map(|token| bearer_headers(&token))
            .unwrap_or_default()
    }
}

fn bearer_headers(token: &str) -> Headers {
    let mut headers = Headers::new();
    headers.insert(AUTHENTICATION_HEADER.to_string(), format!("Bearer {}", token));
    headers
}

/// Find `key` in a `name=value; name=value` cookie string.
pub fn pull_cookie_value(cookies: &str, key: &str) -> Option<String> {
    cookies
        .split(';')
        .map(|c| c.trim_start_matches(' '))
        .find_map(|c| c.strip_prefix(key)?.strip_prefix('='))
        .map(str::to_string)
}
