//! Favorited products.
//!
//! Toggling is split in two: a synchronous local transition that is
//! persisted and broadcast immediately, and, when signed in, a
//! [`SyncIntent`] queued for the [`FavoritesSyncWorker`]. Local storage is
//! the source of truth for display; the backend copy is advisory.

mod sync;

pub use sync::{FavoritesSyncWorker, SyncIntent};

use std::sync::{Arc, PoisonError, RwLock};

use nature_core::ProductId;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::api::types::Product;
use crate::api::{ApiClient, ApiError};
use crate::auth::TokenStore;
use crate::catalog::CatalogClient;
use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

const EVENT_CAPACITY: usize = 64;

/// Errors raised by favorites operations.
#[derive(Debug, Error)]
pub enum FavoritesError {
    /// A remote favorites call was attempted without a session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The backend call failed.
    #[error("favorites API error: {0}")]
    Api(#[from] ApiError),
}

/// Outcome of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteChange {
    Added(ProductId),
    Removed(ProductId),
}

/// The favorites set.
pub struct FavoritesStore {
    ids: RwLock<Vec<ProductId>>,
    storage: Arc<dyn KeyValueStore>,
    tokens: TokenStore,
    intents: mpsc::UnboundedSender<SyncIntent>,
    events: broadcast::Sender<FavoriteChange>,
}

impl FavoritesStore {
    /// Create the store from persisted ids, along with the worker that syncs its toggles.
    ///
    /// The worker must be driven (see [`FavoritesSyncWorker::spawn`]) for
    /// toggles to reach the backend.
    #[must_use]
    pub fn hydrate(
        storage: Arc<dyn KeyValueStore>,
        tokens: TokenStore,
        api: ApiClient,
    ) -> (Self, FavoritesSyncWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let store = Self {
            ids: RwLock::new(load_ids(storage.as_ref())),
            storage,
            tokens: tokens.clone(),
            intents: tx,
            events,
        };

        (store, FavoritesSyncWorker::new(api, tokens, rx))
    }

    /// Subscribe to toggles made through this store.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FavoriteChange> {
        self.events.subscribe()
    }

    /// Flip membership of `product_id`.
    ///
    /// The change is applied, persisted, and broadcast before this returns.
    /// When a session exists a sync intent is queued as well; its outcome
    /// never affects local state.
    pub fn toggle(&self, product_id: ProductId) -> FavoriteChange {
        let change = {
            let mut ids = self.ids.write().unwrap_or_else(PoisonError::into_inner);
            let change = if let Some(pos) = ids.iter().position(|id| *id == product_id) {
                ids.remove(pos);
                FavoriteChange::Removed(product_id)
            } else {
                ids.push(product_id);
                FavoriteChange::Added(product_id)
            };
            self.storage.save_json(keys::FAVORITES, ids.as_slice());
            change
        };

        tracing::debug!(product_id = %product_id, ?change, "Favorite toggled");

        if self.tokens.has_session() && self.intents.send(change.into()).is_err() {
            tracing::warn!(product_id = %product_id, "Favorites sync worker gone, change stays local");
        }

        let _ = self.events.send(change);
        change
    }

    #[must_use]
    pub fn is_favorite(&self, product_id: ProductId) -> bool {
        self.read().contains(&product_id)
    }

    /// Favorited ids in the order they were added.
    #[must_use]
    pub fn ids(&self) -> Vec<ProductId> {
        self.read().clone()
    }

    /// Re-read persisted ids, picking up writes made by another store instance.
    pub fn reload(&self) {
        let ids = load_ids(self.storage.as_ref());
        *self.ids.write().unwrap_or_else(PoisonError::into_inner) = ids;
    }

    /// Catalog products for the favorited ids, in favorite order.
    ///
    /// Ids with no matching catalog product are skipped.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::Api` if the catalog cannot be fetched.
    pub async fn list(&self, catalog: &CatalogClient) -> Result<Vec<Product>, FavoritesError> {
        let ids = self.ids();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut products = catalog.all_products().await?;
        let listed: Vec<Product> = ids
            .iter()
            .filter_map(|id| {
                products
                    .iter()
                    .position(|p| p.id == *id)
                    .map(|pos| products.swap_remove(pos))
            })
            .collect();

        if listed.len() < ids.len() {
            tracing::debug!(
                missing = ids.len() - listed.len(),
                "Favorited products missing from catalog"
            );
        }
        Ok(listed)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ProductId>> {
        self.ids.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_ids(storage: &dyn KeyValueStore) -> Vec<ProductId> {
    let persisted: Vec<ProductId> = storage.load_json(keys::FAVORITES).unwrap_or_default();
    let mut ids = Vec::with_capacity(persisted.len());
    for id in persisted {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
