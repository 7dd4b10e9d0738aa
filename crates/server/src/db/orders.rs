//! Order repository.
//!
//! Order creation runs inside a transaction owned by the order service;
//! the insert helpers here take the transaction's connection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use clementine_core::{OrderId, OrderStatus, PaymentMethod, ProductId, UserId, VariantSelector};

use super::RepositoryError;
use crate::models::order::PaymentResult;
use crate::models::{NewOrder, Order, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = "id, order_number, user_id, shipping_address, payment_method, \
     coupon_code, subtotal, discount, shipping_charge, total, status, is_paid, paid_at, \
     payment_result, is_delivered, delivered_at, tracking_number, notes, created_at, updated_at";

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: i32,
    shipping_address: Json<ShippingAddress>,
    payment_method: PaymentMethod,
    coupon_code: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    shipping_charge: Decimal,
    total: Decimal,
    status: OrderStatus,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    payment_result: Option<Json<PaymentResult>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    tracking_number: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            order_number: self.order_number,
            user_id: UserId::new(self.user_id),
            items,
            shipping_address: self.shipping_address.0,
            payment_method: self.payment_method,
            coupon_code: self.coupon_code,
            subtotal: self.subtotal,
            discount: self.discount,
            shipping_charge: self.shipping_charge,
            total: self.total,
            status: self.status,
            is_paid: self.is_paid,
            paid_at: self.paid_at,
            payment_result: self.payment_result.map(|j| j.0),
            is_delivered: self.is_delivered,
            delivered_at: self.delivered_at,
            tracking_number: self.tracking_number,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Internal row type for order item queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: i32,
    name: String,
    quantity: i32,
    unit_price: Decimal,
    image_url: Option<String>,
    variant_color: Option<String>,
    variant_size: Option<String>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity on order {} item",
                row.order_id
            ))
        })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            quantity,
            unit_price: row.unit_price,
            image_url: row.image_url,
            variant: VariantSelector {
                color: row.variant_color,
                size: row.variant_size,
            },
        })
    }
}

/// Admin listing filter and pagination.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: i64,
    pub limit: i64,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its item snapshots inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn insert_with_items(
        conn: &mut PgConnection,
        new: &NewOrder,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO "order" (order_number, user_id, shipping_address, payment_method,
                                 coupon_code, subtotal, discount, shipping_charge, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(&new.order_number)
            .bind(new.user_id)
            .bind(Json(&new.shipping_address))
            .bind(new.payment_method)
            .bind(&new.coupon_code)
            .bind(new.subtotal)
            .bind(new.discount)
            .bind(new.shipping_charge)
            .bind(new.total)
            .fetch_one(&mut *conn)
            .await?;

        let order_id = OrderId::new(row.id);
        for item in &new.items {
            sqlx::query(
                r"
                INSERT INTO order_item (order_id, product_id, name, quantity, unit_price,
                                        image_url, variant_color, variant_size)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
            .bind(item.unit_price)
            .bind(&item.image_url)
            .bind(&item.variant.color)
            .bind(&item.variant.size)
            .execute(&mut *conn)
            .await?;
        }

        Ok(row.into_order(new.items.clone()))
    }

    /// Get an order by its ID, with items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(r#"SELECT {ORDER_COLUMNS} FROM "order" WHERE id = $1"#);
        let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let items = self.load_items(&[row.id]).await?.remove(&row.id);
        Ok(Some(row.into_order(items.unwrap_or_default())))
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            r#"SELECT {ORDER_COLUMNS} FROM "order" WHERE user_id = $1 ORDER BY created_at DESC"#
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        self.assemble(rows).await
    }

    /// Admin listing with optional status filter and pagination.
    ///
    /// Returns the page of orders plus the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_admin(
        &self,
        query: OrderListQuery,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let limit = query.limit.clamp(1, 100);
        let offset = (query.page.max(1) - 1) * limit;

        let (rows, total) = match query.status {
            Some(status) => {
                let sql = format!(
                    r#"SELECT {ORDER_COLUMNS} FROM "order" WHERE status = $1
                       ORDER BY created_at DESC LIMIT $2 OFFSET $3"#
                );
                let rows = sqlx::query_as::<_, OrderRow>(&sql)
                    .bind(status)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool)
                    .await?;
                let total: i64 =
                    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "order" WHERE status = $1"#)
                        .bind(status)
                        .fetch_one(self.pool)
                        .await?;
                (rows, total)
            }
            None => {
                let sql = format!(
                    r#"SELECT {ORDER_COLUMNS} FROM "order"
                       ORDER BY created_at DESC LIMIT $1 OFFSET $2"#
                );
                let rows = sqlx::query_as::<_, OrderRow>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool)
                    .await?;
                let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "order""#)
                    .fetch_one(self.pool)
                    .await?;
                (rows, total)
            }
        };

        let orders = self.assemble(rows).await?;
        Ok((orders, total))
    }

    /// Mark an order paid and move it to `processing`, inside the
    /// transaction that also records the paid event.
    ///
    /// Guarded on the order still being unpaid and `pending`, so a
    /// duplicate confirmation cannot double-apply and a cancelled order
    /// cannot be revived into `processing`. Returns `false` when the
    /// guard failed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_paid_in_tx(
        conn: &mut PgConnection,
        id: OrderId,
        result: &PaymentResult,
    ) -> Result<bool, RepositoryError> {
        let outcome = sqlx::query(
            r#"
            UPDATE "order"
            SET is_paid = TRUE, paid_at = now(), status = 'processing',
                payment_result = $1, updated_at = now()
            WHERE id = $2 AND NOT is_paid AND status = 'pending'
            "#,
        )
        .bind(Json(result))
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }

    /// Apply an admin status update, guarded on the expected current
    /// status so racing updates cannot slip through the transition table.
    ///
    /// Returns `false` when the order was no longer in `expected` status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_status_in_tx(
        conn: &mut PgConnection,
        id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
        tracking_number: Option<&str>,
        notes: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let delivered = target == OrderStatus::Delivered;
        let result = sqlx::query(
            r#"
            UPDATE "order"
            SET status = $1,
                tracking_number = COALESCE($2, tracking_number),
                notes = COALESCE($3, notes),
                is_delivered = is_delivered OR $4,
                delivered_at = CASE WHEN $4 THEN now() ELSE delivered_at END,
                updated_at = now()
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(target)
        .bind(tracking_number)
        .bind(notes)
        .bind(delivered)
        .bind(id)
        .bind(expected)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancel an order inside a transaction, guarded on it still being
    /// cancellable. Returns `false` when the guard failed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cancel_in_tx(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE "order"
            SET status = 'cancelled', updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch item snapshots for a set of orders, keyed by order id.
    async fn load_items(
        &self,
        order_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<OrderItem>>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, product_id, name, quantity, unit_price,
                   image_url, variant_color, variant_size
            FROM order_item
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<i32, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id;
            by_order.entry(order_id).or_default().push(row.try_into()?);
        }
        Ok(by_order)
    }

    /// Attach items to a page of order rows.
    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }
}
