//! Cache types for catalog responses.

use nature_core::Locale;

use crate::api::types::{Category, Page, Product, ProductQuery};

/// Cache key for catalog lookups.
///
/// Product text is translated server-side, so every key carries the locale
/// it was fetched in.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product { slug: String, locale: Locale },
    Products { query: ProductQuery, locale: Locale },
    Collection { name: &'static str, limit: usize, locale: Locale },
    Category { slug: String, locale: Locale },
    Categories { locale: Locale },
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Page<Product>),
    Collection(Vec<Product>),
    Category(Box<Category>),
    Categories(Vec<Category>),
}
