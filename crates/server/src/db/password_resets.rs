//! Password reset OTP repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use clementine_core::UserId;

use super::RepositoryError;

/// A pending password reset request.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordReset {
    pub id: i32,
    pub user_id: i32,
    pub otp_hash: String,
    pub attempts: i32,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
}

/// Repository for password reset OTPs.
pub struct PasswordResetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetRepository<'a> {
    /// Create a new password reset repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Replace any outstanding request for a user with a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn replace_for_user(
        &self,
        user_id: UserId,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_reset WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO password_reset (user_id, otp_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(otp_hash)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Find the live (unused, unexpired) request for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordReset>, RepositoryError> {
        let row = sqlx::query_as::<_, PasswordReset>(
            "SELECT id, user_id, otp_hash, attempts, is_used, expires_at \
             FROM password_reset \
             WHERE user_id = $1 AND NOT is_used AND expires_at > $2",
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Count a failed verification attempt and return the new total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the request vanished.
    pub async fn record_attempt(&self, id: i32) -> Result<i32, RepositoryError> {
        let attempts: Option<i32> = sqlx::query_scalar(
            "UPDATE password_reset SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        attempts.ok_or(RepositoryError::NotFound)
    }

    /// Mark a request consumed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_used(&self, id: i32) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE password_reset SET is_used = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete a request outright (too many attempts).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM password_reset WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
