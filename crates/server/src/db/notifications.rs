//! In-app notification repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use clementine_core::{NotificationId, UserId};

use super::RepositoryError;

/// An in-app notification.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i32,
    #[serde(skip)]
    pub user_id: i32,
    pub event: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, event, title, message, link, is_read, created_at";

/// Repository for in-app notifications.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a notification for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert(
        &self,
        user_id: UserId,
        event: &str,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notification (user_id, event, title, message, link) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(event)
        .bind(title)
        .bind(message)
        .bind(link)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// List a user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let sql = if unread_only {
            format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notification \
                 WHERE user_id = $1 AND NOT is_read ORDER BY created_at DESC LIMIT $2"
            )
        } else {
            format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notification \
                 WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
            )
        };

        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(limit.clamp(1, 100))
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Mark one notification read, owner-scoped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it isn't the user's.
    pub async fn mark_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE notification SET is_read = TRUE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark all of a user's notifications read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notification SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete one notification, owner-scoped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it isn't the user's.
    pub async fn delete(&self, id: NotificationId, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM notification WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
