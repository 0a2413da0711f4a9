//! Access/refresh token persistence.
//!
//! Tokens have one authoritative home, the key-value store, and one
//! projection, a cookie holding the access token so server-side route
//! guarding can see it. [`TokenStore`] is the only writer of either and
//! always updates both in the same call: storage first, then the cookie.
//!
//! # Inconsistency window
//!
//! The projection can disagree with storage in two ways:
//! - between the storage write and the cookie write of a single call, a
//!   concurrent reader of the cookie sees the previous token
//! - the cookie expires after its max-age while the stored token lives on
//!   until logout or a failed refresh; the guard then treats the user as
//!   signed out until the next token write re-issues the cookie

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use cookie::{Cookie, CookieJar, SameSite};
use secrecy::{ExposeSecret, SecretString};

use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// Name of the cookie mirroring the access token.
pub const ACCESS_TOKEN_COOKIE: &str = keys::ACCESS_TOKEN;

/// The access-token cookie, scoped to the whole site.
#[must_use]
pub fn access_cookie(value: &str, max_age: Duration) -> Cookie<'static> {
    let seconds = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((ACCESS_TOKEN_COOKIE, value.to_owned()))
        .path("/")
        .max_age(cookie::time::Duration::seconds(seconds))
        .same_site(SameSite::Lax)
        .build()
}

/// A cookie that deletes the access-token cookie.
#[must_use]
pub fn access_cookie_removal() -> Cookie<'static> {
    let mut cookie = access_cookie("", Duration::ZERO);
    cookie.make_removal();
    cookie
}

/// `Set-Cookie` header value for `cookie`, percent-encoding name and value.
#[must_use]
pub fn set_cookie_header(cookie: &Cookie<'_>) -> String {
    cookie.encoded().to_string()
}

fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie
        .max_age()
        .is_some_and(|age| age <= cookie::time::Duration::ZERO)
}

/// Destination for cookie writes.
pub trait CookieMirror: Send + Sync {
    /// Apply a cookie write. Removal cookies (zero max-age) delete the entry.
    fn write(&self, cookie: Cookie<'static>);

    /// Current value of cookie `name`.
    fn read(&self, name: &str) -> Option<String>;
}

/// Cookie jar kept in memory, standing in for the browser's.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    jar: RwLock<CookieJar>,
}

impl MemoryCookieJar {
    /// Create an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `Cookie` request header carrying every live cookie, or `None` if the jar is empty.
    #[must_use]
    pub fn request_header(&self) -> Option<String> {
        let jar = self.jar.read().unwrap_or_else(PoisonError::into_inner);
        let mut pairs: Vec<String> = jar
            .iter()
            .map(|cookie| cookie.encoded().stripped().to_string())
            .collect();
        if pairs.is_empty() {
            return None;
        }
        pairs.sort();
        Some(pairs.join("; "))
    }
}

impl CookieMirror for MemoryCookieJar {
    fn write(&self, cookie: Cookie<'static>) {
        let mut jar = self.jar.write().unwrap_or_else(PoisonError::into_inner);
        if is_removal(&cookie) {
            jar.remove(cookie);
        } else {
            jar.add(cookie);
        }
    }

    fn read(&self, name: &str) -> Option<String> {
        let jar = self.jar.read().unwrap_or_else(PoisonError::into_inner);
        jar.get(name).map(|cookie| cookie.value_trimmed().to_owned())
    }
}

/// Owner of the access and refresh tokens.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn CookieMirror>,
    cookie_max_age: Duration,
}

impl TokenStore {
    /// Create a token store over `storage` that mirrors the access token into `cookies`.
    #[must_use]
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn CookieMirror>,
        cookie_max_age: Duration,
    ) -> Self {
        Self {
            storage,
            cookies,
            cookie_max_age,
        }
    }

    /// Stored access token. Empty values count as absent.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.load(keys::ACCESS_TOKEN)
    }

    /// Stored refresh token. Empty values count as absent.
    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.load(keys::REFRESH_TOKEN)
    }

    /// Whether an access token is stored.
    ///
    /// Presence only: tokens are opaque and never inspected for expiry.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.access_token().is_some()
    }

    /// Persist a freshly issued token pair.
    pub fn store_session(&self, access: &SecretString, refresh: &SecretString) {
        self.storage
            .save_json(keys::REFRESH_TOKEN, refresh.expose_secret());
        self.store_access(access);
    }

    /// Replace the access token (after a refresh) and re-issue the cookie.
    pub fn store_access(&self, access: &SecretString) {
        self.storage
            .save_json(keys::ACCESS_TOKEN, access.expose_secret());
        self.cookies
            .write(access_cookie(access.expose_secret(), self.cookie_max_age));
    }

    /// Remove both tokens and expire the cookie.
    pub fn clear(&self) {
        self.storage.discard(keys::ACCESS_TOKEN);
        self.storage.discard(keys::REFRESH_TOKEN);
        self.cookies.write(access_cookie_removal());
    }

    fn load(&self, key: &str) -> Option<SecretString> {
        self.storage
            .load_json::<String>(key)
            .filter(|token| !token.is_empty())
            .map(SecretString::from)
    }
}
