//! HTTP client for the marketplace backend.
//!
//! # Request conventions
//!
//! - Every path is rooted under `/api/` (a bare `/auth/login/` becomes `/api/auth/login/`)
//! - `Accept-Language` carries the persisted language preference on every request
//! - Requests made with [`Credentials::Session`] carry `Authorization: Bearer <access token>`
//!   read from storage at send time, so a token refreshed mid-flow is picked up
//!   by the next request without rebuilding the client
//!
//! There are no retries here. The only retry in the storefront is the
//! refresh-and-retry of the profile fetch in [`crate::auth::AuthManager`].

pub mod types;

use std::sync::Arc;

use nature_core::Locale;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::StorefrontConfig;
use crate::locale::LanguagePreference;
use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// Maximum number of response body characters included in logs.
const LOG_BODY_LIMIT: usize = 500;

/// Errors returned by backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request did not complete (connection refused, timeout, TLS...).
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {}", summarize_body(.body))]
    Status {
        status: StatusCode,
        body: serde_json::Value,
    },

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The endpoint path could not be joined onto the base URL.
    #[error("Invalid endpoint {0}: {1}")]
    Endpoint(String, url::ParseError),
}

impl ApiError {
    /// HTTP status, when the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the credentials (HTTP 401).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Whether the request was rejected as invalid input (HTTP 4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| s.is_client_error())
    }

    /// Top-level `detail` message, or the first `non_field_errors` entry.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        let Self::Status { body, .. } = self else {
            return None;
        };
        body.get("detail")
            .and_then(serde_json::Value::as_str)
            .or_else(|| first_message(body.get("non_field_errors")))
    }

    /// First validation message reported for `field`.
    #[must_use]
    pub fn field_error(&self, field: &str) -> Option<&str> {
        let Self::Status { body, .. } = self else {
            return None;
        };
        first_message(body.get(field))
    }
}

/// A field error is either a string or a list of strings.
fn first_message(value: Option<&serde_json::Value>) -> Option<&str> {
    match value? {
        serde_json::Value::String(s) => Some(s.as_str()),
        serde_json::Value::Array(items) => items.first().and_then(serde_json::Value::as_str),
        _ => None,
    }
}

fn summarize_body(body: &serde_json::Value) -> String {
    let text = match body {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.chars().take(200).collect()
}

/// Which credentials a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials {
    /// No `Authorization` header (login, registration, token refresh, catalog).
    Anonymous,
    /// Bearer access token from storage, if one is stored.
    Session,
}

/// Client for the marketplace REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    storage: Arc<dyn KeyValueStore>,
    language: LanguagePreference,
}

impl ApiClient {
    /// Create a client for the backend named in `config`.
    ///
    /// `storage` is read on every request for the access token and language preference.
    #[must_use]
    pub fn new(config: &StorefrontConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_url.clone(),
                language: LanguagePreference::new(Arc::clone(&storage), config.default_locale),
                storage,
            }),
        }
    }

    /// Backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Language sent with requests: the stored preference, else the configured default.
    #[must_use]
    pub fn locale(&self) -> Locale {
        self.inner.language.current()
    }

    /// Resolve `path` to an absolute endpoint under `/api/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Endpoint` if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let api_path = if path.starts_with("/api/") {
            path.to_string()
        } else {
            format!("/api/{}", path.trim_start_matches('/'))
        };
        self.inner
            .base_url
            .join(&api_path)
            .map_err(|e| ApiError::Endpoint(api_path, e))
    }

    // =========================================================================
    // Request Methods
    // =========================================================================

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not successful,
    /// or the body does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        credentials: Credentials,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.execute(Method::GET, url, None::<&()>, credentials).await
    }

    /// `GET` a JSON resource with query-string parameters.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        credentials: Credentials,
    ) -> Result<T, ApiError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        self.execute(Method::GET, url, None::<&()>, credentials).await
    }

    /// `POST` a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        credentials: Credentials,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        self.execute(Method::POST, url, Some(body), credentials).await
    }

    /// Send a bodiless request whose response content is irrelevant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not successful.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        credentials: Credentials,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        self.execute::<(), serde::de::IgnoredAny>(method, url, None, credentials)
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(method = %method, path = %url.path()))]
    async fn execute<B, T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        credentials: Credentials,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .inner
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT_LANGUAGE, self.locale().code());

        if credentials == Credentials::Session
            && let Some(token) = self
                .inner
                .storage
                .load_json::<String>(keys::ACCESS_TOKEN)
                .filter(|t| !t.is_empty())
        {
            request = request.bearer_auth(token);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(
                status = %status,
                body = %text.chars().take(LOG_BODY_LIMIT).collect::<String>(),
                "Backend returned non-success status"
            );
            let body = serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::Value::String(text.clone()));
            return Err(ApiError::Status { status, body });
        }

        // 204 and other empty bodies decode like JSON null
        let payload = if text.trim().is_empty() { "null" } else { text.as_str() };

        serde_json::from_str(payload).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(LOG_BODY_LIMIT).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Decode(e)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn client(store: Arc<MemoryStore>) -> ApiClient {
        let config = StorefrontConfig::for_api(Url::parse("http://api.test:8000").unwrap());
        ApiClient::new(&config, store)
    }

    #[test]
    fn test_endpoint_adds_api_prefix() {
        let api = client(Arc::new(MemoryStore::new()));
        assert_eq!(
            api.endpoint("/auth/login/").unwrap().as_str(),
            "http://api.test:8000/api/auth/login/"
        );
        assert_eq!(
            api.endpoint("/api/products/").unwrap().as_str(),
            "http://api.test:8000/api/products/"
        );
        assert_eq!(
            api.endpoint("categories/").unwrap().as_str(),
            "http://api.test:8000/api/categories/"
        );
    }

    #[test]
    fn test_locale_prefers_stored_value() {
        let store = Arc::new(MemoryStore::new());
        let api = client(Arc::clone(&store));
        assert_eq!(api.locale(), Locale::Es);

        store.save_json(keys::LOCALE, "en");
        assert_eq!(api.locale(), Locale::En);

        store.save_json(keys::LOCALE, "klingon");
        assert_eq!(api.locale(), Locale::Es);
    }

    #[test]
    fn test_error_detail_extraction() {
        let err = ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            body: serde_json::json!({
                "non_field_errors": ["Unable to log in with provided credentials."],
                "email": ["Enter a valid email address."]
            }),
        };
        assert!(err.is_client_error());
        assert!(!err.is_unauthorized());
        assert_eq!(err.detail(), Some("Unable to log in with provided credentials."));
        assert_eq!(err.field_error("email"), Some("Enter a valid email address."));
        assert_eq!(err.field_error("password1"), None);
    }

    #[test]
    fn test_error_display_truncates_body() {
        let err = ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: serde_json::Value::String("x".repeat(1000)),
        };
        assert!(err.to_string().len() < 300);
        assert!(err.to_string().starts_with("HTTP 502 Bad Gateway"));
    }
}
