//! Client-side shopping cart.
//!
//! [`CartStore`] holds the authoritative list of line items in memory,
//! guards every mutation against the stock ceiling captured on each item,
//! and rewrites the whole list to storage after each change. Views learn
//! about changes by subscribing to [`CartEvent`]s; the store itself has no
//! notion of a cart drawer or any other presentation state.
//!
//! # Invariants
//!
//! - No line item is ever stored with quantity 0
//! - Unless an item has unlimited stock, `quantity <= stock_limit` after every successful mutation
//! - A rejected mutation leaves items and totals unchanged
//! - The item count and total price are always representable
//!
//! Tabs are not reconciled: whichever store writes last wins.

mod item;

pub use item::{CartLineItem, CartProduct};

use std::sync::{Arc, PoisonError, RwLock};

use nature_core::{Price, ProductId};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::error::add_breadcrumb;
use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// Capacity of the event channel; slow subscribers skip older events.
const EVENT_CAPACITY: usize = 64;

/// Errors returned by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The mutation would take the item above its available stock.
    #[error("only {available} of product {product_id} available, {requested} requested")]
    StockExceeded {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The product is not in the cart.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),

    /// Items are added in quantities of at least one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The quantity or the cart total would exceed what can be represented.
    #[error("quantity of product {0} is too large")]
    QuantityOverflow(ProductId),
}

impl CartError {
    /// Inline message for the product page or cart drawer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::StockExceeded { available: 0, .. } => "This product is out of stock.".to_string(),
            Self::StockExceeded { available, .. } => {
                format!("Only {available} available. You already have the maximum in your cart.")
            }
            Self::NotInCart(_) => "This product is no longer in your cart.".to_string(),
            Self::InvalidQuantity => "Please choose a quantity of at least 1.".to_string(),
            Self::QuantityOverflow(_) => "That quantity is too large.".to_string(),
        }
    }
}

/// Derived cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartTotals {
    pub total_items: u64,
    pub total_price: Price,
}

impl CartTotals {
    /// Totals of `items`, or `None` if the count or price overflows.
    fn of(items: &[CartLineItem]) -> Option<Self> {
        items.iter().try_fold(Self::default(), |totals, item| {
            Some(Self {
                total_items: totals.total_items.checked_add(u64::from(item.quantity))?,
                total_price: totals.total_price.checked_add(item.line_total()?)?,
            })
        })
    }
}

/// Notification sent after a cart change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// An add succeeded. Presentation layers typically open the cart drawer on this.
    ItemAdded {
        product_id: ProductId,
        quantity: u32,
    },
    /// Items changed; carries the new totals.
    Changed(CartTotals),
    /// The cart was emptied.
    Cleared,
}

/// The shopping cart.
pub struct CartStore {
    items: RwLock<Vec<CartLineItem>>,
    storage: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<CartEvent>,
}

impl CartStore {
    /// Create a cart hydrated from `storage`.
    ///
    /// Persisted items that violate the cart invariants are dropped, as is
    /// any duplicate of an earlier product. A missing or malformed list
    /// starts an empty cart.
    #[must_use]
    pub fn hydrate(storage: Arc<dyn KeyValueStore>) -> Self {
        let persisted: Vec<CartLineItem> = storage.load_json(keys::CART).unwrap_or_default();
        let loaded = persisted.len();

        let mut items: Vec<CartLineItem> = Vec::with_capacity(loaded);
        for item in persisted {
            if item.is_valid() && !items.iter().any(|i| i.product_id() == item.product_id()) {
                items.push(item);
                if CartTotals::of(&items).is_none() {
                    items.pop();
                }
            }
        }
        if items.len() != loaded {
            tracing::warn!(
                dropped = loaded - items.len(),
                "Dropped invalid persisted cart items"
            );
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            items: RwLock::new(items),
            storage,
            events,
        }
    }

    /// Subscribe to cart changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Snapshot of the line items, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.read().clone()
    }

    /// Quantity of `product_id` in the cart, 0 if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.read()
            .iter()
            .find(|item| item.product_id() == product_id)
            .map_or(0, |item| item.quantity)
    }

    /// Whether one more unit of `product_id` fits under `stock_limit`.
    #[must_use]
    pub fn can_add_more(
        &self,
        product_id: ProductId,
        stock_limit: Option<u32>,
        is_unlimited: bool,
    ) -> bool {
        if is_unlimited {
            return true;
        }
        stock_limit.is_none_or(|limit| self.quantity_of(product_id) < limit)
    }

    /// Total item count and price.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        // Hydration and every mutation keep the totals representable
        CartTotals::of(&self.read()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product`.
    ///
    /// On success the stored display fields and stock limit are replaced by
    /// those of `product`, since they are the freshest the caller has.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is 0,
    /// `CartError::StockExceeded` if the cart would then hold more than
    /// `product`'s stock limit, or `CartError::QuantityOverflow` if the line
    /// quantity or the cart total cannot be represented. The cart is
    /// unchanged on error.
    pub fn add_item(&self, product: &CartProduct, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let totals = {
            let mut items = self.write();
            let current = items
                .iter()
                .find(|item| item.product_id() == product.product_id)
                .map_or(0, |item| item.quantity);
            let requested = current
                .checked_add(quantity)
                .ok_or(CartError::QuantityOverflow(product.product_id))?;

            check_limit(product, requested)?;

            let line = CartLineItem {
                product: product.clone(),
                quantity: requested,
            };
            let mut next = items.clone();
            match next.iter_mut().find(|item| item.product_id() == product.product_id) {
                Some(existing) => *existing = line,
                None => next.push(line),
            }
            let totals =
                CartTotals::of(&next).ok_or(CartError::QuantityOverflow(product.product_id))?;

            *items = next;
            self.persist(&items);
            totals
        };

        let id = product.product_id.to_string();
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &id)]));
        tracing::debug!(product_id = %product.product_id, quantity, "Added to cart");

        self.emit(CartEvent::ItemAdded {
            product_id: product.product_id,
            quantity,
        });
        self.emit(CartEvent::Changed(totals));
        Ok(())
    }

    /// Set the quantity of a product already in the cart. 0 removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product is absent (unless
    /// `quantity` is 0), `CartError::StockExceeded` if `quantity` is above
    /// the item's stock limit, or `CartError::QuantityOverflow` if the cart total
    /// cannot be represented. The cart is unchanged on error.
    pub fn update_quantity(&self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            self.remove_item(product_id);
            return Ok(());
        }

        let totals = {
            let mut items = self.write();
            let mut next = items.clone();
            let item = next
                .iter_mut()
                .find(|item| item.product_id() == product_id)
                .ok_or(CartError::NotInCart(product_id))?;

            check_limit(&item.product, quantity)?;
            item.quantity = quantity;
            let totals = CartTotals::of(&next).ok_or(CartError::QuantityOverflow(product_id))?;

            *items = next;
            self.persist(&items);
            totals
        };

        let id = product_id.to_string();
        let qty = quantity.to_string();
        add_breadcrumb(
            "cart",
            "Updated cart quantity",
            Some(&[("product_id", &id), ("quantity", &qty)]),
        );

        self.emit(CartEvent::Changed(totals));
        Ok(())
    }

    /// Remove a product. Removing an absent product does nothing.
    pub fn remove_item(&self, product_id: ProductId) {
        let totals = {
            let mut items = self.write();
            let before = items.len();
            items.retain(|item| item.product_id() != product_id);
            if items.len() == before {
                return;
            }
            self.persist(&items);
            CartTotals::of(&items).unwrap_or_default()
        };

        let id = product_id.to_string();
        add_breadcrumb("cart", "Removed from cart", Some(&[("product_id", &id)]));

        self.emit(CartEvent::Changed(totals));
    }

    /// Empty the cart (logout, completed order).
    pub fn clear(&self) {
        {
            let mut items = self.write();
            items.clear();
            self.persist(&items);
        }

        add_breadcrumb("cart", "Cleared cart", None);
        tracing::debug!("Cart cleared");

        self.emit(CartEvent::Cleared);
        self.emit(CartEvent::Changed(CartTotals::default()));
    }

    // =========================================================================
    // Internals
    // =========================================================================

    // Item lists are only replaced whole after all checks, so a poisoned
    // lock still guards a consistent list.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<CartLineItem>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<CartLineItem>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called with the write lock held so storage sees writes in mutation order.
    fn persist(&self, items: &[CartLineItem]) {
        self.storage.save_json(keys::CART, items);
    }

    fn emit(&self, event: CartEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn check_limit(product: &CartProduct, requested: u32) -> Result<(), CartError> {
    match product.effective_limit() {
        Some(available) if requested > available => Err(CartError::StockExceeded {
            product_id: product.product_id,
            requested,
            available,
        }),
        _ => Ok(()),
    }
}
