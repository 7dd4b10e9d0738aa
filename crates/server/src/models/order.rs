//! Order model: an immutable snapshot of a cart at checkout time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clementine_core::{OrderId, OrderStatus, PaymentMethod, ProductId, UserId, VariantSelector};

/// Shipping destination captured at order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Reject blank required fields, naming the first offender.
    ///
    /// # Errors
    ///
    /// Returns the field name that is empty.
    pub fn validate(&self) -> Result<(), &'static str> {
        let required = [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(name);
            }
        }
        Ok(())
    }
}

/// Gateway confirmation stored on a paid order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Gateway-side reference (payment intent / payment id).
    pub reference: String,
    pub status: String,
    pub captured_at: DateTime<Utc>,
}

/// One snapshot line of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub variant: VariantSelector,
}

/// A placed order.
///
/// Everything except `status`, payment/delivery flags, `tracking_number`
/// and `notes` is immutable after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_charge: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_result: Option<PaymentResult>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The insertable part of an order, assembled by the order service.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_charge: Decimal,
    pub total: Decimal,
}

/// Generate a human-readable, unique-enough order number, e.g.
/// `ORD-20260806-4F7KQZ`. Uniqueness is ultimately enforced by the
/// database constraint.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    use rand::Rng;

    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            char::from(ALPHABET[idx])
        })
        .collect();

    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "A. Shopper".to_string(),
            line1: "1 Market St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            state: "OR".to_string(),
            postal_code: "97477".to_string(),
            country: "US".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_address_validation_names_the_field() {
        assert!(address().validate().is_ok());

        let mut addr = address();
        addr.city = "  ".to_string();
        assert_eq!(addr.validate().unwrap_err(), "city");
    }

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number("2026-08-06T12:00:00Z".parse().unwrap());
        assert!(number.starts_with("ORD-20260806-"));
        assert_eq!(number.len(), "ORD-20260806-".len() + 6);
        let suffix = number.rsplit('-').next().unwrap();
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        // Ambiguous characters are excluded from the alphabet.
        assert!(!suffix.contains('O') && !suffix.contains('0'));
    }

    #[test]
    fn test_order_numbers_differ() {
        let now = Utc::now();
        assert_ne!(generate_order_number(now), generate_order_number(now));
    }
}
