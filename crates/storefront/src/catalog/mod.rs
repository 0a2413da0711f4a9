//! Read-only access to the remote product catalog.
//!
//! Catalog responses are cached with `moka` for 5 minutes. Stock-sensitive
//! calls ([`CatalogClient::check_availability`]) bypass the cache.

mod cache;

use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use crate::api::types::{Availability, Category, Page, Product, ProductQuery};
use crate::api::{ApiClient, ApiError, Credentials};

use cache::{CacheKey, CacheValue};

/// Upper bound on pages walked by [`CatalogClient::all_products`].
const MAX_CATALOG_PAGES: u32 = 20;

/// Client for catalog endpoints.
#[derive(Clone)]
pub struct CatalogClient {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogClient {
    /// Create a catalog client sharing `api`'s connection pool.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self { api, cache }
    }

    /// List one page of products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, ApiError> {
        let key = CacheKey::Products {
            query: query.clone(),
            locale: self.api.locale(),
        };

        if let Some(CacheValue::Products(page)) = self.cache.get(&key).await {
            debug!("Cache hit for product list");
            return Ok(page);
        }

        let page: Page<Product> = self
            .api
            .get_with_query("/products/", &query.to_pairs(), Credentials::Anonymous)
            .await?;

        self.cache
            .insert(key, CacheValue::Products(page.clone()))
            .await;

        Ok(page)
    }

    /// Every product in the catalog, following pagination.
    ///
    /// Stops after a fixed number of pages so a misbehaving `next` link cannot loop forever.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    #[instrument(skip(self))]
    pub async fn all_products(&self) -> Result<Vec<Product>, ApiError> {
        let mut products = Vec::new();

        for page_number in 1..=MAX_CATALOG_PAGES {
            let page = self.list_products(&ProductQuery::page(page_number)).await?;
            let has_next = page.next.is_some();
            products.extend(page.results);
            if !has_next {
                return Ok(products);
            }
        }

        tracing::warn!(
            pages = MAX_CATALOG_PAGES,
            "Catalog pagination limit reached, list may be incomplete"
        );
        Ok(products)
    }

    /// Up to `limit` products the backend marks as featured.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn featured_products(&self, limit: usize) -> Result<Vec<Product>, ApiError> {
        self.collection("featured", limit).await
    }

    /// Up to `limit` of the most recently added products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn new_arrivals(&self, limit: usize) -> Result<Vec<Product>, ApiError> {
        self.collection("new_arrivals", limit).await
    }

    /// A curated product list served at `/products/<name>/?limit=`.
    async fn collection(&self, name: &'static str, limit: usize) -> Result<Vec<Product>, ApiError> {
        let key = CacheKey::Collection {
            name,
            limit,
            locale: self.api.locale(),
        };

        if let Some(CacheValue::Collection(products)) = self.cache.get(&key).await {
            debug!(collection = name, "Cache hit for product collection");
            return Ok(products);
        }

        let path = format!("/products/{name}/");
        let products: Vec<Product> = self
            .api
            .get_with_query(&path, &[("limit", limit.to_string())], Credentials::Anonymous)
            .await?;

        self.cache
            .insert(key, CacheValue::Collection(products.clone()))
            .await;

        Ok(products)
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn product_by_slug(&self, slug: &str) -> Result<Product, ApiError> {
        let key = CacheKey::Product {
            slug: slug.to_string(),
            locale: self.api.locale(),
        };

        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let path = format!("/products/{}/", urlencoding::encode(slug));
        let product: Product = self.api.get(&path, Credentials::Anonymous).await?;

        self.cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// All product categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let key = CacheKey::Categories {
            locale: self.api.locale(),
        };

        if let Some(CacheValue::Categories(categories)) = self.cache.get(&key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let page: Page<Category> = self.api.get("/categories/", Credentials::Anonymous).await?;

        self.cache
            .insert(key, CacheValue::Categories(page.results.clone()))
            .await;

        Ok(page.results)
    }

    /// Get a category by its slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the category is not found or the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn category_by_slug(&self, slug: &str) -> Result<Category, ApiError> {
        let key = CacheKey::Category {
            slug: slug.to_string(),
            locale: self.api.locale(),
        };

        if let Some(CacheValue::Category(category)) = self.cache.get(&key).await {
            debug!("Cache hit for category");
            return Ok(*category);
        }

        let path = format!("/categories/{}/", urlencoding::encode(slug));
        let category: Category = self.api.get(&path, Credentials::Anonymous).await?;

        self.cache
            .insert(key, CacheValue::Category(Box::new(category.clone())))
            .await;

        Ok(category)
    }

    /// Ask the backend whether `quantity` units of a product can be bought now.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn check_availability(
        &self,
        slug: &str,
        quantity: u32,
    ) -> Result<Availability, ApiError> {
        let path = format!("/products/{}/availability/", urlencoding::encode(slug));
        self.api
            .get_with_query(&path, &[("quantity", quantity.to_string())], Credentials::Anonymous)
            .await
    }

    /// Drop every cached response.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}
