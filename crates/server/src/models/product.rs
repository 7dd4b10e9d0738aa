//! Product catalog model.
//!
//! The catalog is a collaborator of the cart/order core: carts read price
//! and stock, the order lifecycle writes stock and `sold_count` deltas.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use clementine_core::ProductId;

/// Stock level at or below which a low-stock alert is raised (while the
/// product is still in stock).
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub sold_count: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` more units can currently be taken from stock.
    #[must_use]
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        i64::from(self.stock) >= i64::from(quantity)
    }
}
