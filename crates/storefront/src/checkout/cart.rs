//! Session cart.
//!
//! The cart belongs to one checkout session. The checkout flow reads it to
//! price the order and clears it exactly once, when a payment succeeds.

use std::sync::{Arc, Mutex, PoisonError};

use kirana_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    /// Unit price in major units.
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
}

impl CartItem {
    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Shared handle to a session's cart.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Arc<Mutex<Vec<CartItem>>>,
}

impl Cart {
    #[must_use]
    pub fn new(items: Vec<CartItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }

    /// Snapshot of the current items.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().clone()
    }

    /// Sum of `price * quantity` over all items.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lock().iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lock().iter().map(|item| item.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every item.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CartItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
