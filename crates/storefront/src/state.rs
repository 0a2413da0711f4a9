//! Edge server state shared across handlers.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::catalog::CatalogClient;
use crate::config::StorefrontConfig;
use crate::middleware::RouteGuard;
use crate::storage::DetachedStore;

/// State shared by all edge server handlers.
///
/// Cheap to clone. The edge server renders nothing itself, so its backend
/// client runs detached from any client-side storage.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    guard: RouteGuard,
    catalog: CatalogClient,
}

impl AppState {
    /// Create state with the default route tables.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        Self::with_guard(config, RouteGuard::default())
    }

    /// Create state with custom route tables.
    #[must_use]
    pub fn with_guard(config: StorefrontConfig, guard: RouteGuard) -> Self {
        let api = ApiClient::new(&config, Arc::new(DetachedStore));

        Self {
            inner: Arc::new(AppStateInner {
                catalog: CatalogClient::new(api),
                config,
                guard,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.inner.guard
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }
}
