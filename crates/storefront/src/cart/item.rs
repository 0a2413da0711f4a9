//! Cart line items.

use nature_core::{Price, ProductId};
use serde::{Deserialize, Serialize};

use crate::api::types::Product;

/// The product half of a line item: a display cache plus the stock ceiling
/// captured when the product was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub title: String,
    #[serde(rename = "price")]
    pub unit_price: Price,
    #[serde(default)]
    pub price_label: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub slug: String,
    /// Units available; `None` means unconstrained.
    #[serde(rename = "stock", default, skip_serializing_if = "Option::is_none")]
    pub stock_limit: Option<u32>,
    #[serde(default)]
    pub is_unlimited_stock: bool,
}

impl CartProduct {
    /// Capture the cart-relevant fields of a catalog product.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id,
            title: product.title.clone(),
            unit_price: product.price,
            price_label: product.price_label.clone().unwrap_or_default(),
            image: product.image_url().unwrap_or_default().to_string(),
            category: product.category_slug().unwrap_or_default().to_string(),
            slug: product.slug.clone(),
            stock_limit: product.stock,
            is_unlimited_stock: product.is_unlimited_stock,
        }
    }

    /// The ceiling `quantity` must respect, if any.
    #[must_use]
    pub const fn effective_limit(&self) -> Option<u32> {
        if self.is_unlimited_stock {
            None
        } else {
            self.stock_limit
        }
    }
}

/// One product in the cart with its quantity.
///
/// Persisted as a flat JSON object (`{"id":1,"title":...,"quantity":2}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    #[serde(flatten)]
    pub product: CartProduct,
    pub quantity: u32,
}

impl CartLineItem {
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product.product_id
    }

    /// `unit_price * quantity`, or `None` if the amount overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.product.unit_price.times(self.quantity)
    }

    /// Whether the item satisfies the cart invariants: positive quantity within its stock ceiling.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.quantity >= 1
            && self
                .product
                .effective_limit()
                .is_none_or(|limit| self.quantity <= limit)
    }
}
