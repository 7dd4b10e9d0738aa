//! Database operations for the Clementine `PostgreSQL` store.
//!
//! # Tables
//!
//! - `user` / `password_reset` - Accounts, lockout state, OTP reset codes
//! - `product` - Catalog (stock and `sold_count` written by order flows)
//! - `cart` / `cart_item` - Per-owner carts with derived totals
//! - `coupon` - Discount codes
//! - `order` / `order_item` - Immutable order snapshots
//! - `session` - Refresh sessions (token digests only)
//! - `notification` - In-app notifications
//! - `outbox_event` - Transactional side-effect outbox
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and are run via:
//! ```bash
//! cargo run -p clementine-cli -- migrate
//! ```
//!
//! Queries use sqlx's runtime-checked API with `FromRow` row types that are
//! converted into domain models via `TryFrom`.

pub mod carts;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod outbox;
pub mod password_resets;
pub mod products;
pub mod sessions;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use coupons::CouponRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use outbox::OutboxRepository;
pub use password_resets::PasswordResetRepository;
pub use products::ProductRepository;
pub use sessions::SessionRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
