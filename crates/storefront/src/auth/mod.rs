//! Session lifecycle against the marketplace backend.
//!
//! [`AuthManager`] owns login, registration, logout, and resolution of the
//! current user. Tokens live in a [`TokenStore`]; their validity is never
//! checked locally. A stale access token is only discovered when the profile
//! fetch answers 401, at which point exactly one refresh-token exchange is
//! attempted before the session is dropped.

mod error;
mod tokens;

pub use error::{
    AuthError, INVALID_LOGIN_MESSAGE, INVALID_REGISTRATION_MESSAGE, NETWORK_MESSAGE,
};
pub use tokens::{
    ACCESS_TOKEN_COOKIE, CookieMirror, MemoryCookieJar, TokenStore, access_cookie,
    access_cookie_removal, set_cookie_header,
};

use std::sync::RwLock;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use crate::api::types::{
    AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegistrationRequest, User,
    UserPayload,
};
use crate::api::{ApiClient, ApiError, Credentials};
use crate::error::{clear_sentry_user, set_sentry_user};

/// Tokens and user issued by a successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub user: Option<User>,
}

/// Registration form fields.
#[derive(Debug, Clone, Default)]
pub struct RegisterFields {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Navigation the presentation layer must perform after an auth action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Reload the whole application at `to`, discarding all in-memory state.
    FullReload { to: String },
}

/// Manages the signed-in session.
pub struct AuthManager {
    api: ApiClient,
    tokens: TokenStore,
    user: RwLock<Option<User>>,
}

impl AuthManager {
    /// Create a manager issuing requests through `api` and persisting tokens in `tokens`.
    #[must_use]
    pub const fn new(api: ApiClient, tokens: TokenStore) -> Self {
        Self {
            api,
            tokens,
            user: RwLock::new(None),
        }
    }

    /// Token store backing this manager.
    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Whether an access token is stored. Says nothing about its validity.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.has_session()
    }

    /// The last user resolved by this manager, without touching the network.
    #[must_use]
    pub fn cached_user(&self) -> Option<User> {
        self.user.read().ok().and_then(|user| user.clone())
    }

    // =========================================================================
    // Login / Registration
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField` if either field is blank,
    /// `AuthError::InvalidCredentials` if the backend rejects the credentials,
    /// or `AuthError::Network` if the request fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        require("email", email)?;
        require("password", password)?;

        let response: AuthResponse = self
            .api
            .post(
                "/auth/login/",
                &LoginRequest { email, password },
                Credentials::Anonymous,
            )
            .await
            .map_err(|e| AuthError::from_submission(e, &[], INVALID_LOGIN_MESSAGE))?;

        let session = self.begin_session(response).await?;
        tracing::info!("User logged in");
        Ok(session)
    }

    /// Create an account and sign in with it.
    ///
    /// Only required-field presence is checked here; everything else is
    /// validated by the backend.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField` if email or password is blank,
    /// `AuthError::InvalidCredentials` carrying the backend's first field
    /// message if the registration is rejected, `AuthError::SessionNotIssued`
    /// if the account was created without tokens, or `AuthError::Network` if
    /// the request fails.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn register(&self, form: &RegisterFields) -> Result<AuthSession, AuthError> {
        require("email", &form.email)?;
        require("password", &form.password)?;

        let request = RegistrationRequest {
            email: &form.email,
            password1: &form.password,
            password2: &form.password,
            first_name: &form.first_name,
            last_name: &form.last_name,
        };

        let response: AuthResponse = self
            .api
            .post("/auth/registration/", &request, Credentials::Anonymous)
            .await
            .map_err(|e| {
                AuthError::from_submission(
                    e,
                    &["email", "password1", "password2"],
                    INVALID_REGISTRATION_MESSAGE,
                )
            })?;

        let session = self.begin_session(response).await?;
        tracing::info!("User registered");
        Ok(session)
    }

    /// Persist the tokens of a login/registration response and resolve its user.
    async fn begin_session(&self, response: AuthResponse) -> Result<AuthSession, AuthError> {
        let (Some(access), Some(refresh)) = (
            response.access.filter(|t| !t.is_empty()),
            response.refresh.filter(|t| !t.is_empty()),
        ) else {
            return Err(AuthError::SessionNotIssued);
        };

        let access = SecretString::from(access);
        let refresh = SecretString::from(refresh);
        self.tokens.store_session(&access, &refresh);

        let user = match response.user.and_then(UserPayload::into_user) {
            Some(user) => {
                self.remember(Some(user.clone()));
                Some(user)
            }
            None => self.current_user().await,
        };

        Ok(AuthSession {
            access_token: access,
            refresh_token: refresh,
            user,
        })
    }

    // =========================================================================
    // Logout
    // =========================================================================

    /// End the session.
    ///
    /// The backend is told on a best-effort basis; local tokens, the cookie
    /// mirror, and the cached user are cleared regardless. The caller must
    /// perform the returned full reload so no other component keeps state
    /// from the old session.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Navigation {
        if self.tokens.has_session()
            && let Err(e) = self
                .api
                .send(Method::POST, "/auth/logout/", Credentials::Session)
                .await
        {
            tracing::debug!(error = %e, "Backend logout failed, clearing local session anyway");
        }

        self.end_session();
        tracing::info!("User logged out");

        Navigation::FullReload {
            to: "/".to_string(),
        }
    }

    fn end_session(&self) {
        self.tokens.clear();
        self.remember(None);
    }

    // =========================================================================
    // Current User
    // =========================================================================

    /// Resolve the signed-in user.
    ///
    /// Returns `None` immediately when no access token is stored. On a 401
    /// the refresh token is exchanged once and the profile fetch retried
    /// once; if either step is rejected the session is cleared. Failures here
    /// are never surfaced: the session simply degrades to signed out.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Option<User> {
        if !self.tokens.has_session() {
            return None;
        }

        match self.fetch_profile().await {
            Ok(user) => self.remember(user),
            Err(e) if e.is_unauthorized() => self.refresh_and_retry().await,
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch failed, keeping stored session");
                None
            }
        }
    }

    /// Re-resolve the current user, replacing the cached copy.
    pub async fn refresh_user(&self) -> Option<User> {
        self.current_user().await
    }

    async fn refresh_and_retry(&self) -> Option<User> {
        if let Err(e) = self.refresh_access_token().await {
            tracing::warn!(error = %e, "Token refresh failed, ending session");
            self.end_session();
            return None;
        }

        match self.fetch_profile().await {
            Ok(user) => self.remember(user),
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch failed after token refresh");
                if e.is_unauthorized() {
                    self.end_session();
                }
                None
            }
        }
    }

    /// Exchange the refresh token for a new access token.
    async fn refresh_access_token(&self) -> Result<(), AuthError> {
        let refresh = self.tokens.refresh_token().ok_or(AuthError::NotAuthenticated)?;

        let response: RefreshResponse = self
            .api
            .post(
                "/auth/token/refresh/",
                &RefreshRequest {
                    refresh: refresh.expose_secret(),
                },
                Credentials::Anonymous,
            )
            .await
            .map_err(AuthError::Network)?;

        let access = SecretString::from(response.access);
        match response.refresh {
            Some(rotated) => self.tokens.store_session(&access, &SecretString::from(rotated)),
            None => self.tokens.store_access(&access),
        }

        tracing::debug!("Access token refreshed");
        Ok(())
    }

    async fn fetch_profile(&self) -> Result<Option<User>, ApiError> {
        let payload: UserPayload = self.api.get("/users/profile/", Credentials::Session).await?;
        let user = payload.into_user();
        if user.is_none() {
            tracing::warn!("Profile response carried no user id");
        }
        Ok(user)
    }

    /// Replace the cached user and the error-tracking user context.
    fn remember(&self, user: Option<User>) -> Option<User> {
        match &user {
            Some(u) => set_sentry_user(&u.id, Some(&u.email)),
            None => clear_sentry_user(),
        }
        if let Ok(mut cached) = self.user.write() {
            cached.clone_from(&user);
        }
        user
    }

    // =========================================================================
    // Social Login
    // =========================================================================

    /// Entry point of the backend's Google OAuth flow.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Endpoint` if the configured base URL cannot be joined.
    pub fn google_auth_url(&self) -> Result<Url, ApiError> {
        self.api.endpoint("/auth/social/google/login/")
    }
}

fn require(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        Err(AuthError::MissingField(field))
    } else {
        Ok(())
    }
}
