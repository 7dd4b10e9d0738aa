//! Order lifecycle service.
//!
//! Orders are created from a cart snapshot in a single transaction with
//! atomic conditional stock decrements, and then driven through
//! `pending -> processing -> shipped -> delivered` (with `cancelled`
//! reachable from the first two states only). Side effects go through the
//! transactional outbox.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use clementine_core::{CartTotals, OrderId, OrderStatus, PaymentMethod, UserId};

use crate::db::orders::OrderListQuery;
use crate::db::{
    CartRepository, CouponRepository, OrderRepository, OutboxRepository, ProductRepository,
    RepositoryError,
};
use crate::models::order::{PaymentResult, generate_order_number};
use crate::models::product::LOW_STOCK_THRESHOLD;
use crate::models::{
    Cart, CartOwner, NewOrder, Order, OrderItem, OutboxEvent, ShippingAddress, User,
};
use crate::services::payments::{PaymentConfirmation, PaymentError, PaymentIntent, PaymentService};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// A required input field is missing or empty.
    #[error("missing or empty field: {0}")]
    Validation(&'static str),

    /// Orders cannot be created from an empty cart.
    #[error("cart is empty")]
    CartEmpty,

    /// A line item's quantity exceeds current stock; nothing was mutated.
    #[error("insufficient stock for {product}")]
    InsufficientStock { product: String },

    /// No such order.
    #[error("order not found")]
    NotFound,

    /// The requester is neither the order's owner nor an admin.
    #[error("not authorized for this order")]
    Forbidden,

    /// The requested status change is not in the legal-transition table.
    #[error("cannot move order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// Cancellation window has closed.
    #[error("cannot cancel an order that is {0}")]
    NotCancellable(OrderStatus),

    /// The order is already paid.
    #[error("order is already paid")]
    AlreadyPaid,

    /// The order changed underneath this request; retry.
    #[error("order was modified concurrently")]
    Conflict,

    /// The gateway did not confirm the payment; the order stays unpaid.
    #[error("payment verification failed")]
    PaymentDeclined,

    /// Upstream gateway failure.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Underlying storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Input for order creation.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Input for an admin status update.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

/// Order lifecycle service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
    carts: CartRepository<'a>,
    coupons: CouponRepository<'a>,
    payments: &'a PaymentService,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, payments: &'a PaymentService) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
            carts: CartRepository::new(pool),
            coupons: CouponRepository::new(pool),
            payments,
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create an order from the user's cart.
    ///
    /// Runs as one transaction: conditional stock decrements (all line
    /// items or none), coupon consumption, the order + item snapshots, the
    /// `order.placed` / `product.low_stock` outbox events, and the cart
    /// clear. Two racing checkouts cannot both take the last unit.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation`, `OrderError::CartEmpty`, or
    /// `OrderError::InsufficientStock` (in which case no stock moved).
    pub async fn create(&self, user: &User, input: PlaceOrder) -> Result<Order, OrderError> {
        input
            .shipping_address
            .validate()
            .map_err(OrderError::Validation)?;

        let owner = CartOwner::User(user.id);
        let cart = self
            .carts
            .find_by_owner(&owner)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(OrderError::CartEmpty)?;

        // Re-evaluate the coupon against the cart at this instant; a code
        // that went stale since it was applied just contributes nothing.
        let now = Utc::now();
        let coupon = match &cart.coupon_code {
            Some(code) => self.coupons.find_by_code(code).await?,
            None => None,
        };
        let lines = cart.priced_lines();
        let subtotal = CartTotals::compute(&lines, rust_decimal::Decimal::ZERO).subtotal;
        let discount = coupon
            .as_ref()
            .map_or(rust_decimal::Decimal::ZERO, |c| c.discount_for(subtotal, now));
        let totals = CartTotals::compute(&lines, discount);
        let consumed_coupon = coupon.filter(|_| !discount.is_zero());

        let new_order = NewOrder {
            order_number: generate_order_number(now),
            user_id: user.id,
            items: snapshot_items(&cart),
            shipping_address: input.shipping_address,
            payment_method: input.payment_method,
            coupon_code: consumed_coupon.as_ref().map(|c| c.code.clone()),
            subtotal: totals.subtotal,
            discount: totals.discount,
            shipping_charge: totals.shipping_charge,
            total: totals.total,
        };

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        // All-or-nothing: the first failed conditional decrement aborts
        // the transaction and undoes every earlier one.
        let mut low_stock = Vec::new();
        for item in &cart.items {
            let remaining =
                ProductRepository::reserve_stock(&mut *tx, item.product_id, item.quantity)
                    .await?
                    .ok_or_else(|| OrderError::InsufficientStock {
                        product: item.product_name.clone(),
                    })?;

            if remaining > 0 && remaining <= LOW_STOCK_THRESHOLD {
                low_stock.push(OutboxEvent::LowStock {
                    product_id: item.product_id,
                    name: item.product_name.clone(),
                    stock: remaining,
                });
            }
        }

        if let Some(coupon) = &consumed_coupon {
            CouponRepository::increment_usage(&mut *tx, &coupon.code).await?;
        }

        let order = OrderRepository::insert_with_items(&mut *tx, &new_order).await?;

        OutboxRepository::append(
            &mut *tx,
            &OutboxEvent::OrderPlaced {
                order_id: order.id,
                order_number: order.order_number.clone(),
                user_id: user.id,
                total: order.total,
            },
        )
        .await?;
        for event in &low_stock {
            OutboxRepository::append(&mut *tx, event).await?;
        }

        CartRepository::clear_in_tx(&mut *tx, cart.id).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(
            order_number = %order.order_number,
            user_id = %user.id,
            total = %order.total,
            "order placed"
        );

        Ok(order)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get an order, visible to its owner and to admins.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` / `OrderError::Forbidden`.
    pub async fn get(&self, id: OrderId, requester: &User) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        authorize(&order, requester)?;
        Ok(order)
    }

    /// List the requester's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the database fails.
    pub async fn list_mine(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_by_user(user_id).await?)
    }

    /// Admin listing with status filter and pagination.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the database fails.
    pub async fn list_all(&self, query: OrderListQuery) -> Result<(Vec<Order>, i64), OrderError> {
        Ok(self.orders.list_admin(query).await?)
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Create a payment intent for the order's declared method.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` for non-owners and payment errors
    /// from the gateway.
    pub async fn create_payment_intent(
        &self,
        id: OrderId,
        requester: &User,
    ) -> Result<PaymentIntent, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        if order.user_id != requester.id {
            return Err(OrderError::Forbidden);
        }
        if order.is_paid {
            return Err(OrderError::AlreadyPaid);
        }

        Ok(self.payments.create_intent(&order).await?)
    }

    /// Confirm payment of an order after gateway verification.
    ///
    /// Verification failure leaves the order untouched; success marks it
    /// paid and moves it to `processing` in the same transaction that
    /// records the `order.paid` event.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::PaymentDeclined` when the gateway does not
    /// confirm, `OrderError::AlreadyPaid` for a duplicate confirmation.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        requester: &User,
        confirmation: PaymentConfirmation,
    ) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        authorize(&order, requester)?;
        if order.is_paid {
            return Err(OrderError::AlreadyPaid);
        }

        let verified = self.payments.verify(&order, &confirmation).await?;
        if !verified {
            tracing::warn!(order_number = %order.order_number, "payment verification failed");
            return Err(OrderError::PaymentDeclined);
        }

        let result = PaymentResult {
            reference: confirmation.reference(),
            status: "succeeded".to_owned(),
            captured_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let updated = OrderRepository::mark_paid_in_tx(&mut *tx, id, &result).await?;
        if !updated {
            // Paid or cancelled by a racing request since we loaded it.
            return Err(OrderError::Conflict);
        }
        OutboxRepository::append(
            &mut *tx,
            &OutboxEvent::OrderPaid {
                order_id: order.id,
                order_number: order.order_number.clone(),
                user_id: order.user_id,
                total: order.total,
            },
        )
        .await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        self.orders.get(id).await?.ok_or(OrderError::NotFound)
    }

    // =========================================================================
    // Status Transitions
    // =========================================================================

    /// Admin status update, validated against the legal-transition table.
    ///
    /// Moving to `shipped` with a tracking number records an
    /// `order.shipped` event; moving to `delivered` stamps the delivery
    /// flags. Moving to `cancelled` goes through the same stock
    /// restoration as [`Self::cancel`].
    ///
    /// # Errors
    ///
    /// Returns `OrderError::IllegalTransition` for moves outside the
    /// table and `OrderError::Conflict` when the order changed
    /// concurrently.
    pub async fn update_status(
        &self,
        id: OrderId,
        update: StatusUpdate,
    ) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;

        if update.status == OrderStatus::Cancelled {
            return self.cancel_internal(order).await;
        }

        if !order.status.can_transition_to(update.status) {
            return Err(OrderError::IllegalTransition {
                from: order.status,
                to: update.status,
            });
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let updated = OrderRepository::update_status_in_tx(
            &mut *tx,
            id,
            order.status,
            update.status,
            update.tracking_number.as_deref(),
            update.notes.as_deref(),
        )
        .await?;
        if !updated {
            return Err(OrderError::Conflict);
        }

        if update.status == OrderStatus::Shipped
            && let Some(tracking) = &update.tracking_number
        {
            OutboxRepository::append(
                &mut *tx,
                &OutboxEvent::OrderShipped {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    user_id: order.user_id,
                    tracking_number: tracking.clone(),
                },
            )
            .await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        self.orders.get(id).await?.ok_or(OrderError::NotFound)
    }

    /// Cancel an order (owner or admin), restoring exactly the stock and
    /// `sold_count` deltas that creation subtracted.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotCancellable` once the order has shipped.
    pub async fn cancel(&self, id: OrderId, requester: &User) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        authorize(&order, requester)?;
        self.cancel_internal(order).await
    }

    async fn cancel_internal(&self, order: Order) -> Result<Order, OrderError> {
        if !order.status.is_cancellable() {
            return Err(OrderError::NotCancellable(order.status));
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        // Guarded update: if a racing request already shipped or cancelled
        // the order, restore nothing.
        let cancelled = OrderRepository::cancel_in_tx(&mut *tx, order.id).await?;
        if !cancelled {
            return Err(OrderError::Conflict);
        }

        for item in &order.items {
            ProductRepository::release_stock(&mut *tx, item.product_id, item.quantity).await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(order_number = %order.order_number, "order cancelled");

        self.orders
            .get(order.id)
            .await?
            .ok_or(OrderError::NotFound)
    }
}

/// Owner-or-admin visibility check.
fn authorize(order: &Order, requester: &User) -> Result<(), OrderError> {
    if order.user_id == requester.id || requester.is_admin() {
        Ok(())
    } else {
        Err(OrderError::Forbidden)
    }
}

/// Snapshot cart line items into immutable order items.
fn snapshot_items(cart: &Cart) -> Vec<OrderItem> {
    cart.items
        .iter()
        .map(|item| OrderItem {
            product_id: item.product_id,
            name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            image_url: item.product_image.clone(),
            variant: item.variant.clone(),
        })
        .collect()
}
