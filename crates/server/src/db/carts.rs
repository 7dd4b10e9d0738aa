//! Cart repository.
//!
//! Carts are looked up by an explicit owner key (user id or guest key);
//! there is no ambient "current cart" anywhere.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use clementine_core::{CartId, CartItemId, CartTotals, ProductId, VariantSelector};

use super::RepositoryError;
use crate::models::{Cart, CartItem, CartOwner};

/// Untouched carts are purged this long after their last mutation.
pub const CART_RETENTION_DAYS: i64 = 30;

/// Internal row type for cart queries.
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    user_id: Option<i32>,
    guest_key: Option<String>,
    coupon_code: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    shipping_charge: Decimal,
    total: Decimal,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self, items: Vec<CartItem>) -> Result<Cart, RepositoryError> {
        let owner = match (self.user_id, self.guest_key) {
            (Some(user_id), None) => CartOwner::User(user_id.into()),
            (None, Some(key)) => CartOwner::Guest(key),
            _ => {
                return Err(RepositoryError::DataCorruption(
                    "cart must have exactly one owner".to_owned(),
                ));
            }
        };

        Ok(Cart {
            id: CartId::new(self.id),
            owner,
            items,
            coupon_code: self.coupon_code,
            totals: CartTotals {
                subtotal: self.subtotal,
                discount: self.discount,
                shipping_charge: self.shipping_charge,
                total: self.total,
            },
            expires_at: self.expires_at,
            updated_at: self.updated_at,
        })
    }
}

/// Internal row type for cart item queries (joined with product).
#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    product_id: i32,
    quantity: i32,
    unit_price: Decimal,
    variant_color: Option<String>,
    variant_size: Option<String>,
    product_name: String,
    product_image: Option<String>,
    product_stock: i32,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative quantity on cart item {}", row.id))
        })?;

        Ok(Self {
            id: CartItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            quantity,
            unit_price: row.unit_price,
            variant: VariantSelector {
                color: row.variant_color,
                size: row.variant_size,
            },
            product_name: row.product_name,
            product_image: row.product_image,
            product_stock: row.product_stock,
        })
    }
}

const CART_COLUMNS: &str = "id, user_id, guest_key, coupon_code, subtotal, discount, \
     shipping_charge, total, expires_at, updated_at";

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the cart belonging to an owner key, with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, RepositoryError> {
        let sql = match owner {
            CartOwner::User(_) => format!("SELECT {CART_COLUMNS} FROM cart WHERE user_id = $1"),
            CartOwner::Guest(_) => format!("SELECT {CART_COLUMNS} FROM cart WHERE guest_key = $1"),
        };

        let query = sqlx::query_as::<_, CartRow>(&sql);
        let query = match owner {
            CartOwner::User(id) => query.bind(*id),
            CartOwner::Guest(key) => query.bind(key.clone()),
        };

        let Some(row) = query.fetch_optional(self.pool).await? else {
            return Ok(None);
        };

        let items = self.load_items(CartId::new(row.id)).await?;
        row.into_cart(items).map(Some)
    }

    /// Find a cart by owner, creating an empty one lazily when absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        if let Some(cart) = self.find_by_owner(owner).await? {
            return Ok(cart);
        }

        let expires_at = Utc::now() + Duration::days(CART_RETENTION_DAYS);
        let sql = format!(
            "INSERT INTO cart (user_id, guest_key, expires_at) VALUES ($1, $2, $3) \
             RETURNING {CART_COLUMNS}"
        );
        let (user_id, guest_key) = match owner {
            CartOwner::User(id) => (Some(*id), None),
            CartOwner::Guest(key) => (None, Some(key.clone())),
        };

        let row = sqlx::query_as::<_, CartRow>(&sql)
            .bind(user_id)
            .bind(guest_key)
            .bind(expires_at)
            .fetch_one(self.pool)
            .await?;

        row.into_cart(Vec::new())
    }

    /// Load the line items of a cart, joined with live product data.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT ci.id, ci.product_id, ci.quantity, ci.unit_price,
                   ci.variant_color, ci.variant_size,
                   p.name AS product_name, p.image_url AS product_image,
                   p.stock AS product_stock
            FROM cart_item ci
            JOIN product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Append a line item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
        variant: &VariantSelector,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO cart_item (cart_id, product_id, quantity, unit_price,
                                   variant_color, variant_size)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
        .bind(unit_price)
        .bind(&variant.color)
        .bind(&variant.size)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Set a line item's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item is not in this cart.
    pub async fn set_item_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE cart_item SET quantity = $1 WHERE id = $2 AND cart_id = $3")
            .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
            .bind(item_id)
            .bind(cart_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a line item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item is not in this cart.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_item WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(cart_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove every line item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_items(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Set or clear the applied coupon code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_coupon(
        &self,
        cart_id: CartId,
        code: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE cart SET coupon_code = $1, updated_at = now() WHERE id = $2")
            .bind(code)
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Persist recomputed totals and renew the retention window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_totals(
        &self,
        cart_id: CartId,
        totals: &CartTotals,
    ) -> Result<(), RepositoryError> {
        let expires_at = Utc::now() + Duration::days(CART_RETENTION_DAYS);
        sqlx::query(
            r"
            UPDATE cart
            SET subtotal = $1, discount = $2, shipping_charge = $3, total = $4,
                expires_at = $5, updated_at = now()
            WHERE id = $6
            ",
        )
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.shipping_charge)
        .bind(totals.total)
        .bind(expires_at)
        .bind(cart_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete a cart and its items (guest cart after a merge).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart WHERE id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Empty a cart inside an order-creation transaction: items gone,
    /// coupon cleared, totals reset to an empty cart's.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn clear_in_tx(
        conn: &mut PgConnection,
        cart_id: CartId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *conn)
            .await?;

        let empty = CartTotals::empty();
        sqlx::query(
            r"
            UPDATE cart
            SET coupon_code = NULL, subtotal = $1, discount = $2,
                shipping_charge = $3, total = $4, updated_at = now()
            WHERE id = $5
            ",
        )
        .bind(empty.subtotal)
        .bind(empty.discount)
        .bind(empty.shipping_charge)
        .bind(empty.total)
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Drop carts whose retention window has passed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
