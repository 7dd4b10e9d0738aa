//! Side-effect events appended transactionally and drained by the outbox
//! worker.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clementine_core::{OrderId, ProductId, UserId};

/// A side effect owed to the outside world (email, in-app notification).
///
/// The serialized form carries the event name in an `event` tag so the
/// payload column is self-describing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum OutboxEvent {
    #[serde(rename = "order.placed")]
    OrderPlaced {
        order_id: OrderId,
        order_number: String,
        user_id: UserId,
        total: Decimal,
    },
    #[serde(rename = "order.paid")]
    OrderPaid {
        order_id: OrderId,
        order_number: String,
        user_id: UserId,
        total: Decimal,
    },
    #[serde(rename = "order.shipped")]
    OrderShipped {
        order_id: OrderId,
        order_number: String,
        user_id: UserId,
        tracking_number: String,
    },
    #[serde(rename = "product.low_stock")]
    LowStock {
        product_id: ProductId,
        name: String,
        stock: i32,
    },
}

impl OutboxEvent {
    /// The event name, as stored in the `event` column.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "order.placed",
            Self::OrderPaid { .. } => "order.paid",
            Self::OrderShipped { .. } => "order.shipped",
            Self::LowStock { .. } => "product.low_stock",
        }
    }
}

/// An unprocessed outbox row claimed by the worker.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub id: i64,
    pub event: OutboxEvent,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_roundtrip() {
        let event = OutboxEvent::OrderShipped {
            order_id: OrderId::new(9),
            order_number: "ORD-20260806-ABCDEF".to_string(),
            user_id: UserId::new(3),
            tracking_number: "1Z999".to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "order.shipped");
        let back: OutboxEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_kind_matches_serde_tag() {
        let event = OutboxEvent::LowStock {
            product_id: ProductId::new(1),
            name: "Widget".to_string(),
            stock: 3,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.kind());
    }
}
