//! Persisted language preference.
//!
//! The preference is read by [`crate::api::ApiClient`] on every request to
//! fill `Accept-Language`, so changing it here takes effect immediately.

use std::sync::Arc;

use nature_core::Locale;

use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// The user's chosen language.
#[derive(Clone)]
pub struct LanguagePreference {
    storage: Arc<dyn KeyValueStore>,
    default: Locale,
}

impl LanguagePreference {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, default: Locale) -> Self {
        Self { storage, default }
    }

    /// Stored language, if it is one we support.
    #[must_use]
    pub fn stored(&self) -> Option<Locale> {
        self.storage
            .load_json::<String>(keys::LOCALE)
            .and_then(|code| code.parse().ok())
    }

    /// Stored language, else the default.
    #[must_use]
    pub fn current(&self) -> Locale {
        self.stored().unwrap_or(self.default)
    }

    /// Resolve the language on first load.
    ///
    /// A stored preference wins. Otherwise `browser_language` (a tag such
    /// as `en-US` or a full `Accept-Language` value) is matched by primary
    /// subtag and, if supported, persisted. Unsupported or missing input
    /// yields the default without persisting anything.
    pub fn initialize(&self, browser_language: Option<&str>) -> Locale {
        if let Some(locale) = self.stored() {
            return locale;
        }

        match browser_language.and_then(Locale::negotiate) {
            Some(detected) => {
                tracing::debug!(locale = %detected, "Detected language");
                self.set(detected);
                detected
            }
            None => self.default,
        }
    }

    /// Persist an explicit choice.
    pub fn set(&self, locale: Locale) {
        self.storage.save_json(keys::LOCALE, locale.code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn preference() -> (LanguagePreference, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let pref = LanguagePreference::new(
            Arc::clone(&storage) as Arc<dyn KeyValueStore>,
            Locale::Es,
        );
        (pref, storage)
    }

    #[test]
    fn test_detects_and_persists_browser_language() {
        let (pref, storage) = preference();
        assert_eq!(pref.initialize(Some("en-GB,en;q=0.9")), Locale::En);
        assert_eq!(pref.current(), Locale::En);
        assert!(!storage.is_empty());
    }

    #[test]
    fn test_unsupported_language_uses_default_without_persisting() {
        let (pref, storage) = preference();
        assert_eq!(pref.initialize(Some("fr-FR")), Locale::Es);
        assert_eq!(pref.initialize(None), Locale::Es);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_stored_choice_wins() {
        let (pref, _) = preference();
        pref.set(Locale::Es);
        assert_eq!(pref.initialize(Some("en-US")), Locale::Es);
    }
}
