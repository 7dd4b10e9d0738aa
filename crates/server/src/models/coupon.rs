//! Coupon model and discount evaluation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use clementine_core::{CouponId, DiscountKind};

/// A discount coupon.
///
/// Applying a coupon to a cart is provisional; `used_count` is only
/// incremented when an order consuming the coupon is created.
#[derive(Debug, Clone, Serialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Uppercase, unique code.
    pub code: String,
    pub description: Option<String>,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub min_purchase: Decimal,
    /// Cap for percentage discounts; ignored for fixed ones.
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the coupon can currently be redeemed: active, inside its
    /// time window, and under its usage cap.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && now >= self.valid_from
            && now <= self.valid_until
            && self
                .usage_limit
                .is_none_or(|limit| self.used_count < limit)
    }

    /// Whether `subtotal` satisfies the minimum purchase requirement.
    #[must_use]
    pub fn meets_minimum(&self, subtotal: Decimal) -> bool {
        subtotal >= self.min_purchase
    }

    /// The discount this coupon grants against `subtotal`.
    ///
    /// Returns zero for an invalid coupon or a subtotal below the minimum
    /// purchase. Percentage discounts are capped at `max_discount` when
    /// present; the result is always clamped to the subtotal so it can
    /// never produce a negative total contribution.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal, now: DateTime<Utc>) -> Decimal {
        if !self.is_valid(now) || !self.meets_minimum(subtotal) {
            return Decimal::ZERO;
        }

        let discount = match self.kind {
            DiscountKind::Percentage => {
                let raw = subtotal * self.value / Decimal::ONE_HUNDRED;
                self.max_discount.map_or(raw, |cap| raw.min(cap))
            }
            DiscountKind::Fixed => self.value,
        };

        discount.min(subtotal)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn coupon(kind: DiscountKind, value: &str) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "SAVE".to_string(),
            description: None,
            kind,
            value: dec(value),
            min_purchase: Decimal::ZERO,
            max_discount: None,
            usage_limit: None,
            used_count: 0,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let c = coupon(DiscountKind::Percentage, "10");
        assert_eq!(c.discount_for(dec("200.00"), Utc::now()), dec("20.00"));
    }

    #[test]
    fn test_percentage_discount_respects_cap() {
        let mut c = coupon(DiscountKind::Percentage, "50");
        c.max_discount = Some(dec("15.00"));
        assert_eq!(c.discount_for(dec("100.00"), Utc::now()), dec("15.00"));
        // Below the cap the raw percentage wins.
        assert_eq!(c.discount_for(dec("20.00"), Utc::now()), dec("10.00"));
    }

    #[test]
    fn test_fixed_discount_clamped_to_subtotal() {
        let c = coupon(DiscountKind::Fixed, "25.00");
        assert_eq!(c.discount_for(dec("100.00"), Utc::now()), dec("25.00"));
        assert_eq!(c.discount_for(dec("12.00"), Utc::now()), dec("12.00"));
    }

    #[test]
    fn test_minimum_purchase_gates_discount() {
        let mut c = coupon(DiscountKind::Fixed, "10.00");
        c.min_purchase = dec("20.00");
        assert_eq!(c.discount_for(dec("19.99"), Utc::now()), Decimal::ZERO);
        assert_eq!(c.discount_for(dec("40.00"), Utc::now()), dec("10.00"));
    }

    #[test]
    fn test_expired_coupon_is_invalid() {
        let mut c = coupon(DiscountKind::Fixed, "10.00");
        c.valid_until = Utc::now() - Duration::hours(1);
        assert!(!c.is_valid(Utc::now()));
        assert_eq!(c.discount_for(dec("100.00"), Utc::now()), Decimal::ZERO);
    }

    #[test]
    fn test_not_yet_valid_coupon_is_invalid() {
        let mut c = coupon(DiscountKind::Fixed, "10.00");
        c.valid_from = Utc::now() + Duration::hours(1);
        assert!(!c.is_valid(Utc::now()));
    }

    #[test]
    fn test_usage_cap() {
        let mut c = coupon(DiscountKind::Fixed, "10.00");
        c.usage_limit = Some(3);
        c.used_count = 2;
        assert!(c.is_valid(Utc::now()));
        c.used_count = 3;
        assert!(!c.is_valid(Utc::now()));
        assert_eq!(c.discount_for(dec("100.00"), Utc::now()), Decimal::ZERO);
    }

    #[test]
    fn test_inactive_coupon_is_invalid() {
        let mut c = coupon(DiscountKind::Fixed, "10.00");
        c.is_active = false;
        assert!(!c.is_valid(Utc::now()));
    }
}
