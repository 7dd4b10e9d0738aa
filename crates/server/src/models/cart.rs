//! Cart model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use clementine_core::{
    CartId, CartItemId, CartTotals, PricedLine, ProductId, UserId, VariantSelector,
};

/// The owner key of a cart: exactly one of an authenticated user or an
/// anonymous guest session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(UserId),
    Guest(String),
}

/// One product+variant+quantity entry in a cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price captured when the item was first added.
    pub unit_price: Decimal,
    #[serde(flatten)]
    pub variant: VariantSelector,
    /// Denormalized product fields for display (joined on read).
    pub product_name: String,
    pub product_image: Option<String>,
    pub product_stock: i32,
}

impl CartItem {
    /// Whether this item would merge with an incoming line for the same
    /// product and variant selection.
    #[must_use]
    pub fn matches(&self, product_id: ProductId, variant: &VariantSelector) -> bool {
        self.product_id == product_id && self.variant == *variant
    }

    /// The pricing-relevant slice of this item.
    #[must_use]
    pub const fn priced(&self) -> PricedLine {
        PricedLine {
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}

/// A shopping cart with derived totals.
///
/// The totals are recomputed by the pricing engine inside every mutating
/// operation; they are stored alongside the items but never patched
/// independently.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    #[serde(skip)]
    pub owner: CartOwner,
    pub items: Vec<CartItem>,
    pub coupon_code: Option<String>,
    #[serde(flatten)]
    pub totals: CartTotals,
    #[serde(skip)]
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// The pricing-engine view of the line items.
    #[must_use]
    pub fn priced_lines(&self) -> Vec<PricedLine> {
        self.items.iter().map(CartItem::priced).collect()
    }

    /// Find a line item by its id.
    #[must_use]
    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Find the line item matching a product + variant selection.
    #[must_use]
    pub fn matching_item(
        &self,
        product_id: ProductId,
        variant: &VariantSelector,
    ) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.matches(product_id, variant))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: i32, product: i32, color: Option<&str>) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            product_id: ProductId::new(product),
            quantity: 1,
            unit_price: "10.00".parse().unwrap(),
            variant: VariantSelector {
                color: color.map(str::to_owned),
                size: None,
            },
            product_name: "Widget".to_string(),
            product_image: None,
            product_stock: 10,
        }
    }

    #[test]
    fn test_matching_requires_product_and_variant() {
        let cart = Cart {
            id: CartId::new(1),
            owner: CartOwner::Guest("guest_x".to_string()),
            items: vec![item(1, 7, Some("red")), item(2, 7, None)],
            coupon_code: None,
            totals: CartTotals::empty(),
            expires_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let red = VariantSelector {
            color: Some("red".to_string()),
            size: None,
        };
        assert_eq!(
            cart.matching_item(ProductId::new(7), &red).unwrap().id,
            CartItemId::new(1)
        );
        // The default variant matches the no-selection line, not the red one.
        assert_eq!(
            cart.matching_item(ProductId::new(7), &VariantSelector::none())
                .unwrap()
                .id,
            CartItemId::new(2)
        );
        assert!(cart.matching_item(ProductId::new(8), &red).is_none());
    }
}
