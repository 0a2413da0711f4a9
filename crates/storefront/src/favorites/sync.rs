//! Best-effort remote sync of favorite toggles.

use reqwest::Method;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

use nature_core::ProductId;

use super::{FavoriteChange, FavoritesError};
use crate::api::{ApiClient, Credentials};
use crate::auth::TokenStore;

/// A remote change the backend should mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncIntent {
    Favorite(ProductId),
    Unfavorite(ProductId),
}

impl SyncIntent {
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        match self {
            Self::Favorite(id) | Self::Unfavorite(id) => *id,
        }
    }

    fn method(&self) -> Method {
        match self {
            Self::Favorite(_) => Method::POST,
            Self::Unfavorite(_) => Method::DELETE,
        }
    }

    fn path(&self) -> String {
        format!("/users/favorites/{}/", self.product_id())
    }
}

impl From<FavoriteChange> for SyncIntent {
    fn from(change: FavoriteChange) -> Self {
        match change {
            FavoriteChange::Added(id) => Self::Favorite(id),
            FavoriteChange::Removed(id) => Self::Unfavorite(id),
        }
    }
}

/// Drains sync intents one at a time, in toggle order.
///
/// Failures are logged and dropped. Nothing is retried and local state is
/// never rolled back.
pub struct FavoritesSyncWorker {
    api: ApiClient,
    tokens: TokenStore,
    pub(super) intents: mpsc::UnboundedReceiver<SyncIntent>,
}

impl FavoritesSyncWorker {
    pub(super) const fn new(
        api: ApiClient,
        tokens: TokenStore,
        intents: mpsc::UnboundedReceiver<SyncIntent>,
    ) -> Self {
        Self {
            api,
            tokens,
            intents,
        }
    }

    /// Run on the current Tokio runtime until the favorites store is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process intents until every sender is gone.
    pub async fn run(mut self) {
        while let Some(intent) = self.intents.recv().await {
            if let Err(e) = self.handle(intent).await {
                tracing::warn!(
                    product_id = %intent.product_id(),
                    error = %e,
                    "Favorite sync failed, keeping local state"
                );
            }
        }
        tracing::debug!("Favorites sync worker stopped");
    }

    /// Process every intent already queued, then return.
    pub async fn drain(&mut self) {
        while let Ok(intent) = self.intents.try_recv() {
            if let Err(e) = self.handle(intent).await {
                tracing::warn!(
                    product_id = %intent.product_id(),
                    error = %e,
                    "Favorite sync failed, keeping local state"
                );
            }
        }
    }

    /// Mirror one intent to the backend.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::NotAuthenticated` if the session ended after
    /// the toggle, or `FavoritesError::Api` if the request fails.
    #[instrument(skip(self))]
    pub async fn handle(&self, intent: SyncIntent) -> Result<(), FavoritesError> {
        if !self.tokens.has_session() {
            return Err(FavoritesError::NotAuthenticated);
        }

        self.api
            .send(intent.method(), &intent.path(), Credentials::Session)
            .await?;

        tracing::debug!("Favorite synced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_routes() {
        let add = SyncIntent::from(FavoriteChange::Added(ProductId::new(5)));
        assert_eq!(add.method(), Method::POST);
        assert_eq!(add.path(), "/users/favorites/5/");

        let remove = SyncIntent::from(FavoriteChange::Removed(ProductId::new(5)));
        assert_eq!(remove.method(), Method::DELETE);
        assert_eq!(remove.path(), "/users/favorites/5/");
    }
}
