//! Application container.
//!
//! [`Storefront`] assembles every client-side store once, wired to a single
//! storage backend and backend client. Views receive it (or the pieces they
//! need) by reference; there are no process-wide singletons.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::{AuthManager, CookieMirror, MemoryCookieJar, Navigation, TokenStore};
use crate::cart::CartStore;
use crate::catalog::CatalogClient;
use crate::config::StorefrontConfig;
use crate::favorites::{FavoritesStore, FavoritesSyncWorker};
use crate::locale::LanguagePreference;
use crate::storage::{KeyValueStore, StorageError, open_store};

/// All client-side state of one storefront instance.
pub struct Storefront {
    config: StorefrontConfig,
    storage: Arc<dyn KeyValueStore>,
    api: ApiClient,
    catalog: CatalogClient,
    language: LanguagePreference,
    auth: AuthManager,
    cart: CartStore,
    favorites: FavoritesStore,
}

impl Storefront {
    /// Assemble the stores over `storage`, mirroring the access token into `cookies`.
    ///
    /// Returns the favorites sync worker, which the caller must drive
    /// (usually with [`FavoritesSyncWorker::spawn`]).
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        storage: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn CookieMirror>,
    ) -> (Self, FavoritesSyncWorker) {
        let api = ApiClient::new(&config, Arc::clone(&storage));
        let tokens = TokenStore::new(
            Arc::clone(&storage),
            cookies,
            config.access_cookie_max_age,
        );
        let (favorites, worker) =
            FavoritesStore::hydrate(Arc::clone(&storage), tokens.clone(), api.clone());

        let storefront = Self {
            catalog: CatalogClient::new(api.clone()),
            language: LanguagePreference::new(Arc::clone(&storage), config.default_locale),
            auth: AuthManager::new(api.clone(), tokens),
            cart: CartStore::hydrate(Arc::clone(&storage)),
            favorites,
            api,
            storage,
            config,
        };

        tracing::debug!(
            cart_items = storefront.cart.items().len(),
            favorites = storefront.favorites.ids().len(),
            "Storefront state hydrated"
        );

        (storefront, worker)
    }

    /// Assemble the stores over the configured storage backend with an in-memory cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be opened.
    pub fn open(config: StorefrontConfig) -> Result<(Self, FavoritesSyncWorker), StorageError> {
        let storage = open_store(&config)?;
        Ok(Self::new(config, storage, Arc::new(MemoryCookieJar::new())))
    }

    /// End the session and empty the cart.
    ///
    /// The returned navigation must be performed so no view keeps state
    /// from the old session.
    pub async fn logout(&self) -> Navigation {
        let navigation = self.auth.logout().await;
        self.cart.clear();
        navigation
    }

    #[must_use]
    pub const fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    #[must_use]
    pub const fn language(&self) -> &LanguagePreference {
        &self.language
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthManager {
        &self.auth
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    #[must_use]
    pub const fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }
}
