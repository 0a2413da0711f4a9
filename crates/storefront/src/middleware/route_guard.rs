//! Coarse route protection from the access-token cookie.
//!
//! The guard only checks that the cookie is present and non-empty. Token
//! freshness is the views' problem: they resolve the user through
//! [`crate::auth::AuthManager`] and redirect again if that fails.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use cookie::Cookie;

use crate::auth::ACCESS_TOKEN_COOKIE;
use crate::state::AppState;

/// Path prefixes that require a session.
pub const PROTECTED_PREFIXES: [&str; 6] = [
    "/dashboard",
    "/profile",
    "/favorites",
    "/tracker",
    "/sponsor",
    "/checkout",
];

/// Path prefixes only meaningful without a session.
pub const AUTH_ONLY_PREFIXES: [&str; 2] = ["/login", "/register"];

/// Path prefixes the guard never looks at (bundle assets, API proxy).
pub const EXCLUDED_PREFIXES: [&str; 5] = [
    "/_next/static",
    "/_next/image",
    "/favicon.ico",
    "/public",
    "/api",
];

/// What to do with a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Route tables and redirect targets.
///
/// Prefixes match textually, so `/profile` also covers `/profile/edit`
/// and `/profile-photos`.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    protected: Vec<String>,
    auth_only: Vec<String>,
    excluded: Vec<String>,
    login_path: String,
    home_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            protected: PROTECTED_PREFIXES.map(String::from).to_vec(),
            auth_only: AUTH_ONLY_PREFIXES.map(String::from).to_vec(),
            excluded: EXCLUDED_PREFIXES.map(String::from).to_vec(),
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
        }
    }
}

impl RouteGuard {
    /// A guard with custom protected and auth-only tables.
    ///
    /// Asset and API prefixes stay excluded and redirects keep targeting
    /// `/login` and `/`.
    #[must_use]
    pub fn new(protected: &[&str], auth_only: &[&str]) -> Self {
        Self {
            protected: protected.iter().map(|p| (*p).to_string()).collect(),
            auth_only: auth_only.iter().map(|p| (*p).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Whether `path` is subject to the guard at all.
    #[must_use]
    pub fn applies_to(&self, path: &str) -> bool {
        !self.excluded.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Decide a navigation to `path` given whether an access-token cookie is present.
    #[must_use]
    pub fn decide(&self, path: &str, has_token: bool) -> GuardDecision {
        if !self.applies_to(path) {
            return GuardDecision::Allow;
        }

        if !has_token && matches_any(&self.protected, path) {
            return GuardDecision::Redirect(self.login_redirect(path));
        }

        if has_token && matches_any(&self.auth_only, path) {
            return GuardDecision::Redirect(self.home_path.clone());
        }

        GuardDecision::Allow
    }

    /// `/login?redirect=<path>`, keeping `/` readable in the return target.
    fn login_redirect(&self, path: &str) -> String {
        let target = urlencoding::encode(path).replace("%2F", "/");
        format!("{}?redirect={target}", self.login_path)
    }
}

fn matches_any(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

/// Value of cookie `name` across all `Cookie` headers, percent-decoded and unquoted.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_owned())
}

/// Whether the request carries a non-empty access-token cookie.
#[must_use]
pub fn has_access_token(headers: &HeaderMap) -> bool {
    cookie_value(headers, ACCESS_TOKEN_COOKIE).is_some_and(|v| !v.is_empty())
}

/// Apply the route guard to every navigation.
pub async fn route_guard_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();

    match state.guard().decide(&path, has_access_token(request.headers())) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(target) => {
            tracing::debug!(path = %path, target = %target, "Route guard redirect");
            Redirect::temporary(&target).into_response()
        }
    }
}
