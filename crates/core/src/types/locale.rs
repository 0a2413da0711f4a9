//! Supported storefront languages.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a language code is not one the storefront ships.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported locale: {0}")]
pub struct LocaleError(pub String);

/// A storefront language.
///
/// Spanish is the default: it is what server-rendered pages use before any
/// preference has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl Locale {
    /// Two-letter code sent in `Accept-Language` and persisted locally.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Es => "es",
            Self::En => "en",
        }
    }

    /// Match a BCP 47 tag such as `en-US` by its primary subtag.
    ///
    /// ```
    /// use nature_core::Locale;
    ///
    /// assert_eq!(Locale::from_language_tag("en-US"), Some(Locale::En));
    /// assert_eq!(Locale::from_language_tag("fr-FR"), None);
    /// ```
    #[must_use]
    pub fn from_language_tag(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_']).next()?.trim();
        primary.parse().ok()
    }

    /// Pick the first supported language from an `Accept-Language` header value.
    ///
    /// Quality weights are ignored; the header order is trusted.
    #[must_use]
    pub fn negotiate(accept_language: &str) -> Option<Self> {
        accept_language
            .split(',')
            .filter_map(|entry| entry.split(';').next())
            .find_map(Self::from_language_tag)
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Self::Es),
            "en" => Ok(Self::En),
            other => Err(LocaleError(other.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
