//! In-app notification writes for outbox events.

use rust_decimal::Decimal;
use sqlx::PgPool;

use clementine_core::{OrderId, ProductId, UserId};

use crate::db::users::UserRepository;
use crate::db::{NotificationRepository, RepositoryError};

/// Writes in-app notifications for domain events.
pub struct NotificationService<'a> {
    notifications: NotificationRepository<'a>,
    users: UserRepository<'a>,
}

impl<'a> NotificationService<'a> {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            notifications: NotificationRepository::new(pool),
            users: UserRepository::new(pool),
        }
    }

    /// Notify the buyer their order was placed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the insert fails.
    pub async fn order_placed(
        &self,
        user_id: UserId,
        order_number: &str,
        order_id: OrderId,
    ) -> Result<(), RepositoryError> {
        self.notifications
            .insert(
                user_id,
                "order.placed",
                "Order placed",
                &format!("Your order {order_number} has been placed."),
                Some(&format!("/orders/{order_id}")),
            )
            .await
    }

    /// Notify the buyer their payment went through.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the insert fails.
    pub async fn payment_success(
        &self,
        user_id: UserId,
        total: Decimal,
        order_id: OrderId,
    ) -> Result<(), RepositoryError> {
        self.notifications
            .insert(
                user_id,
                "order.paid",
                "Payment received",
                &format!("Your payment of ${total} was received."),
                Some(&format!("/orders/{order_id}")),
            )
            .await
    }

    /// Notify the buyer their order shipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the insert fails.
    pub async fn order_shipped(
        &self,
        user_id: UserId,
        order_number: &str,
        order_id: OrderId,
        tracking_number: &str,
    ) -> Result<(), RepositoryError> {
        self.notifications
            .insert(
                user_id,
                "order.shipped",
                "Order shipped",
                &format!("Order {order_number} shipped. Tracking: {tracking_number}."),
                Some(&format!("/orders/{order_id}")),
            )
            .await
    }

    /// Notify every admin that a product is running low.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    pub async fn low_stock(
        &self,
        product_id: ProductId,
        product_name: &str,
        stock: i32,
    ) -> Result<(), RepositoryError> {
        for admin_id in self.users.admin_ids().await? {
            self.notifications
                .insert(
                    admin_id,
                    "product.low_stock",
                    "Low stock",
                    &format!("{product_name} is down to {stock} units."),
                    Some(&format!("/admin/products/{product_id}")),
                )
                .await?;
        }
        Ok(())
    }
}
