//! Wire types for the marketplace backend.
//!
//! These mirror the JSON the backend sends. Optional fields default rather
//! than fail, because list and detail endpoints return different subsets of
//! the same product.

use chrono::{DateTime, Utc};
use nature_core::{CategoryId, Price, ProductId, UserId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog
// =============================================================================

/// How a product is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    /// Recurring yearly sponsorship (e.g. an adopted tree).
    Annual,
    #[default]
    OneTime,
}

/// Category reference embedded in product detail responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub product_count: Option<u32>,
}

/// A gallery image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    /// Annotation shown next to the price (e.g. "/year").
    #[serde(default)]
    pub price_label: Option<String>,
    #[serde(default)]
    pub pricing_type: PricingType,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Present on detail responses.
    #[serde(default)]
    pub category: Option<CategorySummary>,
    /// Present on list responses.
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub category_slug: Option<String>,
    #[serde(default)]
    pub primary_image: Option<String>,
    #[serde(default)]
    pub gallery: Vec<ProductImage>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_in_stock: Option<bool>,
    /// Units available; `None` means the backend does not track stock.
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub is_unlimited_stock: bool,
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl Product {
    /// Category slug from whichever shape the endpoint returned.
    #[must_use]
    pub fn category_slug(&self) -> Option<&str> {
        self.category
            .as_ref()
            .map(|c| c.slug.as_str())
            .or(self.category_slug.as_deref())
    }

    /// Best image for display: the explicit primary image, then the gallery's primary, then any.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.primary_image.as_deref().or_else(|| {
            self.gallery
                .iter()
                .find(|img| img.is_primary)
                .or_else(|| self.gallery.first())
                .map(|img| img.url.as_str())
        })
    }
}

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Filters accepted by the product list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub is_featured: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
}

impl ProductQuery {
    /// Query for one page of the unfiltered catalog.
    #[must_use]
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    /// Non-empty filters as query-string pairs, in a stable order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(product_type) = &self.product_type {
            pairs.push(("product_type", product_type.clone()));
        }
        if let Some(featured) = self.is_featured {
            pairs.push(("is_featured", featured.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(ordering) = &self.ordering {
            pairs.push(("ordering", ordering.clone()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        pairs
    }
}

/// Stock check result for a requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub is_available: bool,
    #[serde(default)]
    pub stock: Option<u32>,
}

// =============================================================================
// Accounts
// =============================================================================

/// A signed-in user as the storefront sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub date_joined: Option<DateTime<Utc>>,
}

impl User {
    /// "First Last", falling back to the email when no name is set.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// User payload as returned by the login, registration, and profile endpoints.
///
/// Auth endpoints identify the user with `pk` and `avatar`, the profile
/// endpoint with `id`, `avatar_url`, and `created_at`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub pk: Option<UserId>,
    #[serde(default)]
    pub id: Option<UserId>,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserPayload {
    /// Normalize into a [`User`]. Returns `None` if the payload carries no identifier.
    #[must_use]
    pub fn into_user(self) -> Option<User> {
        Some(User {
            id: self.pk.or(self.id)?,
            email: self.email,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            avatar_url: self.avatar_url.or(self.avatar),
            date_joined: self.date_joined.or(self.created_at),
        })
    }
}

/// Body of `POST /api/auth/login/`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /api/auth/registration/`.
#[derive(Debug, Serialize)]
pub struct RegistrationRequest<'a> {
    pub email: &'a str,
    pub password1: &'a str,
    pub password2: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// Login and registration response.
///
/// Registration omits the tokens when the backend requires email verification first.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub user: Option<UserPayload>,
}

/// Body of `POST /api/auth/token/refresh/`.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Refresh response. Backends with refresh rotation also return a new refresh token.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_list_shape() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": 7,
            "title": "Adopt a Redwood",
            "slug": "adopt-a-redwood",
            "price": "50.00",
            "price_label": "/year",
            "pricing_type": "annual",
            "category_name": "Trees",
            "category_slug": "trees",
            "primary_image": "https://cdn.test/redwood.jpg",
            "stock": 12,
            "is_unlimited_stock": false
        }))
        .unwrap();

        assert_eq!(product.id, ProductId::new(7));
        assert_eq!(product.price, Price::from_cents(5000));
        assert_eq!(product.pricing_type, PricingType::Annual);
        assert_eq!(product.category_slug(), Some("trees"));
        assert_eq!(product.currency, "EUR");
        assert_eq!(product.stock, Some(12));
    }

    #[test]
    fn test_product_detail_shape() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "Forest Bathing Retreat",
            "slug": "forest-bathing",
            "price": 125,
            "category": {"id": 2, "name": "Retreats", "slug": "retreats"},
            "gallery": [
                {"url": "https://cdn.test/a.jpg", "is_primary": false},
                {"url": "https://cdn.test/b.jpg", "is_primary": true}
            ],
            "is_unlimited_stock": true
        }))
        .unwrap();

        assert_eq!(product.category_slug(), Some("retreats"));
        assert_eq!(product.image_url(), Some("https://cdn.test/b.jpg"));
        assert!(product.stock.is_none());
    }

    #[test]
    fn test_user_payload_from_login() {
        let payload: UserPayload = serde_json::from_value(serde_json::json!({
            "pk": 9,
            "email": "ana@example.com",
            "first_name": "Ana",
            "avatar": "https://cdn.test/ana.png"
        }))
        .unwrap();

        let user = payload.into_user().unwrap();
        assert_eq!(user.id, UserId::new(9));
        assert_eq!(user.last_name, "");
        assert_eq!(user.avatar_url.as_deref(), Some("https://cdn.test/ana.png"));
        assert_eq!(user.display_name(), "Ana");
    }

    #[test]
    fn test_user_payload_without_id() {
        let payload = UserPayload {
            email: "x@example.com".to_string(),
            ..UserPayload::default()
        };
        assert!(payload.into_user().is_none());
    }

    #[test]
    fn test_query_pairs() {
        let query = ProductQuery {
            category: Some("trees".to_string()),
            is_featured: Some(true),
            page: Some(2),
            ..ProductQuery::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("category", "trees".to_string()),
                ("is_featured", "true".to_string()),
                ("page", "2".to_string()),
            ]
        );
    }
}
