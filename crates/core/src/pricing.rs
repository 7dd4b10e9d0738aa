//! Cart pricing engine.
//!
//! Pure arithmetic over line items and a discount amount. The server runs
//! this after every cart mutation so the derived totals are never stale
//! relative to the line items or the applied coupon.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Orders at or above this subtotal ship free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Flat shipping charge below the free-shipping threshold.
pub const FLAT_SHIPPING_CHARGE: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// The pricing-relevant slice of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    /// Units of the product in the cart (always >= 1).
    pub quantity: u32,
    /// Unit price captured when the item was added.
    pub unit_price: Decimal,
}

/// Derived cart totals.
///
/// Invariants guaranteed by [`CartTotals::compute`]:
/// - `discount <= subtotal`
/// - `total == max(subtotal - discount, 0) + shipping_charge`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_charge: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    /// Compute the derived totals for a set of line items and a discount.
    ///
    /// A negative or over-large discount is clamped into `[0, subtotal]`
    /// before the total is derived, so the result can never represent a
    /// negative merchandise value.
    #[must_use]
    pub fn compute(lines: &[PricedLine], discount: Decimal) -> Self {
        let subtotal: Decimal = lines
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum();

        let discount = discount.clamp(Decimal::ZERO, subtotal);

        let shipping_charge = if subtotal >= FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            FLAT_SHIPPING_CHARGE
        };

        let total = (subtotal - discount).max(Decimal::ZERO) + shipping_charge;

        Self {
            subtotal,
            discount,
            shipping_charge,
            total,
        }
    }

    /// Totals of an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::compute(&[], Decimal::ZERO)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(quantity: u32, unit_price: &str) -> PricedLine {
        PricedLine {
            quantity,
            unit_price: unit_price.parse().unwrap(),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_three_units_at_twenty_ships_free() {
        // 3 x 20.00 => subtotal 60, free shipping, no coupon.
        let totals = CartTotals::compute(&[line(3, "20.00")], Decimal::ZERO);
        assert_eq!(totals.subtotal, dec("60.00"));
        assert_eq!(totals.shipping_charge, Decimal::ZERO);
        assert_eq!(totals.total, dec("60.00"));
    }

    #[test]
    fn test_flat_ten_coupon_below_threshold() {
        // Subtotal 40 with a $10 coupon: shipping still applies (40 < 50).
        let totals = CartTotals::compute(&[line(2, "20.00")], dec("10.00"));
        assert_eq!(totals.subtotal, dec("40.00"));
        assert_eq!(totals.discount, dec("10.00"));
        assert_eq!(totals.shipping_charge, dec("10"));
        assert_eq!(totals.total, dec("40.00"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let at = CartTotals::compute(&[line(1, "50.00")], Decimal::ZERO);
        assert_eq!(at.shipping_charge, Decimal::ZERO);

        let below = CartTotals::compute(&[line(1, "49.99")], Decimal::ZERO);
        assert_eq!(below.shipping_charge, dec("10"));
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let totals = CartTotals::compute(&[line(1, "15.00")], dec("100.00"));
        assert_eq!(totals.discount, dec("15.00"));
        // Merchandise fully discounted; only shipping remains.
        assert_eq!(totals.total, dec("10"));
    }

    #[test]
    fn test_negative_discount_treated_as_zero() {
        let totals = CartTotals::compute(&[line(1, "30.00")], dec("-5.00"));
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(totals.total, dec("40.00"));
    }

    #[test]
    fn test_empty_cart() {
        let totals = CartTotals::empty();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        // An empty cart still quotes the flat charge; orders can't be
        // placed from one anyway.
        assert_eq!(totals.shipping_charge, dec("10"));
        assert_eq!(totals.total, dec("10"));
    }

    #[test]
    fn test_total_identity_holds() {
        let lines = [line(2, "12.50"), line(1, "9.99"), line(4, "3.25")];
        for discount in ["0", "5.00", "25.00", "500.00"] {
            let totals = CartTotals::compute(&lines, dec(discount));
            let expected =
                (totals.subtotal - totals.discount).max(Decimal::ZERO) + totals.shipping_charge;
            assert_eq!(totals.total, expected);
            assert!(totals.discount <= totals.subtotal);
        }
    }
}
