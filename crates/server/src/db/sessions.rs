//! Session repository.
//!
//! Stores one row per logged-in device, holding only the SHA-256 digest of
//! the current refresh token. Rotation overwrites the digest in place;
//! revocation flips `is_active` and never deletes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use clementine_core::{SessionId, UserId};

use super::RepositoryError;
use crate::models::{DeviceInfo, Session};

const SESSION_COLUMNS: &str =
    "id, user_id, user_agent, ip, is_active, expires_at, last_activity, created_at";

/// Internal row type for session queries.
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: i32,
    user_id: i32,
    user_agent: Option<String>,
    ip: Option<String>,
    is_active: bool,
    expires_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: SessionId::new(row.id),
            user_id: UserId::new(row.user_id),
            device: DeviceInfo {
                user_agent: row.user_agent,
                ip: row.ip,
            },
            is_active: row.is_active,
            expires_at: row.expires_at,
            last_activity: row.last_activity,
            created_at: row.created_at,
        }
    }
}

/// Repository for session database operations.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a session row for a fresh login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        refresh_token_hash: &str,
        device: &DeviceInfo,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, RepositoryError> {
        let sql = format!(
            "INSERT INTO session (user_id, refresh_token_hash, user_agent, ip, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {SESSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(user_id)
            .bind(refresh_token_hash)
            .bind(&device.user_agent)
            .bind(&device.ip)
            .bind(expires_at)
            .fetch_one(self.pool)
            .await?;

        Ok(row.into())
    }

    /// Find the live session matching a user and refresh-token digest.
    ///
    /// A session matches only while active and unexpired; a digest that was
    /// rotated away never matches again.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active(
        &self,
        user_id: UserId,
        refresh_token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, RepositoryError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM session \
             WHERE user_id = $1 AND refresh_token_hash = $2 AND is_active AND expires_at > $3"
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(user_id)
            .bind(refresh_token_hash)
            .bind(now)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Rotate a session to a new refresh-token digest.
    ///
    /// The old digest stops matching the moment this returns; the row is
    /// reused rather than replaced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session vanished.
    pub async fn rotate(
        &self,
        id: SessionId,
        new_refresh_token_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE session SET refresh_token_hash = $1, last_activity = now() \
             WHERE id = $2 AND is_active",
        )
        .bind(new_refresh_token_hash)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Deactivate the session holding a given digest (logout).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate_by_hash(
        &self,
        user_id: UserId,
        refresh_token_hash: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE session SET is_active = FALSE \
             WHERE user_id = $1 AND refresh_token_hash = $2",
        )
        .bind(user_id)
        .bind(refresh_token_hash)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Deactivate one session by id, owner-scoped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such session belongs to
    /// the user.
    pub async fn deactivate(&self, id: SessionId, user_id: UserId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE session SET is_active = FALSE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Deactivate every active session of a user (logout-all, password
    /// reset).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate_all(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("UPDATE session SET is_active = FALSE WHERE user_id = $1 AND is_active")
                .bind(user_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// List a user's active sessions, most recently used first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, user_id: UserId) -> Result<Vec<Session>, RepositoryError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM session \
             WHERE user_id = $1 AND is_active AND expires_at > now() \
             ORDER BY last_activity DESC"
        );
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete rows whose expiry has passed (CLI sweep; the server itself
    /// never deletes sessions).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM session WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
