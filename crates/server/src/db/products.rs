//! Product repository.
//!
//! Stock mutation happens inside order transactions via the
//! connection-taking associated functions; everything else borrows the
//! pool.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use clementine_core::ProductId;

use super::RepositoryError;
use crate::models::Product;

const PRODUCT_COLUMNS: &str = "id, name, slug, description, price, stock, sold_count, \
     image_url, is_active, created_at, updated_at";

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    stock: i32,
    sold_count: i32,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            stock: row.stock,
            sold_count: row.sold_count,
            image_url: row.image_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields needed to create a product (CLI seeding).
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE is_active \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Number of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product WHERE is_active")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE slug = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug already exists.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO product (name, slug, description, price, stock, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&new.name)
            .bind(&new.slug)
            .bind(&new.description)
            .bind(new.price)
            .bind(new.stock)
            .bind(&new.image_url)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("slug already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        Ok(row.into())
    }

    /// Atomically take `quantity` units out of stock, also bumping
    /// `sold_count`. The decrement only happens when enough stock is on
    /// hand; two racing orders cannot both win the last unit.
    ///
    /// Returns the remaining stock, or `None` when stock was insufficient.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reserve_stock(
        conn: &mut PgConnection,
        id: ProductId,
        quantity: u32,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = i32::try_from(quantity).unwrap_or(i32::MAX);
        let remaining: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE product
            SET stock = stock - $2, sold_count = sold_count + $2, updated_at = now()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            ",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(remaining)
    }

    /// Put `quantity` units back into stock (order cancellation), undoing
    /// the matching `sold_count` bump.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn release_stock(
        conn: &mut PgConnection,
        id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let quantity = i32::try_from(quantity).unwrap_or(i32::MAX);
        sqlx::query(
            r"
            UPDATE product
            SET stock = stock + $2, sold_count = sold_count - $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
