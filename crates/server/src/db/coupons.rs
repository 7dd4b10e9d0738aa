//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use clementine_core::{CouponId, DiscountKind};

use super::RepositoryError;
use crate::models::Coupon;

const COUPON_COLUMNS: &str = "id, code, description, kind, value, min_purchase, max_discount, \
     usage_limit, used_count, valid_from, valid_until, is_active, created_at, updated_at";

/// Internal row type for coupon queries.
#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    description: Option<String>,
    kind: DiscountKind,
    value: Decimal,
    min_purchase: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: Option<i32>,
    used_count: i32,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: CouponId::new(row.id),
            code: row.code,
            description: row.description,
            kind: row.kind,
            value: row.value,
            min_purchase: row.min_purchase,
            max_discount: row.max_discount,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields needed to create a coupon (CLI seeding).
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub description: Option<String>,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub min_purchase: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub valid_until: DateTime<Utc>,
}

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a coupon by code, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupon WHERE code = $1");
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(code.trim().to_uppercase())
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Create a coupon. The code is uppercased before storage.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, new: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            "INSERT INTO coupon (code, description, kind, value, min_purchase, max_discount, \
                                 usage_limit, valid_until) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {COUPON_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(new.code.trim().to_uppercase())
            .bind(&new.description)
            .bind(new.kind)
            .bind(new.value)
            .bind(new.min_purchase)
            .bind(new.max_discount)
            .bind(new.usage_limit)
            .bind(new.valid_until)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("coupon code already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        Ok(row.into())
    }

    /// Consume one use of a coupon inside an order-creation transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn increment_usage(
        conn: &mut PgConnection,
        code: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE coupon SET used_count = used_count + 1, updated_at = now() WHERE code = $1",
        )
        .bind(code)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
