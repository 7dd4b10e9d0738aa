//! Transactional outbox repository.
//!
//! Events are appended inside the transaction that caused them and drained
//! by the outbox worker. Failed dispatches keep their row with an attempt
//! count and the last error for later sweeps.

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use super::RepositoryError;
use crate::models::{OutboxEvent, PendingEvent};

/// Rows that failed this many times stop being retried.
pub const MAX_DISPATCH_ATTEMPTS: i32 = 5;

/// Internal row type for pending event queries.
#[derive(Debug, sqlx::FromRow)]
struct PendingRow {
    id: i64,
    payload: Json<OutboxEvent>,
    attempts: i32,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PendingRow> for PendingEvent {
    fn from(row: PendingRow) -> Self {
        Self {
            id: row.id,
            event: row.payload.0,
            attempts: row.attempts,
            created_at: row.created_at,
        }
    }
}

/// Repository for the side-effect outbox.
pub struct OutboxRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OutboxRepository<'a> {
    /// Create a new outbox repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an event inside the transaction that produced it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn append(
        conn: &mut PgConnection,
        event: &OutboxEvent,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO outbox_event (event, payload) VALUES ($1, $2)")
            .bind(event.kind())
            .bind(Json(event))
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Fetch the oldest undispatched events still under the attempt cap.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim_batch(&self, limit: i64) -> Result<Vec<PendingEvent>, RepositoryError> {
        let rows = sqlx::query_as::<_, PendingRow>(
            r"
            SELECT id, payload, attempts, created_at
            FROM outbox_event
            WHERE processed_at IS NULL AND attempts < $1
            ORDER BY id
            LIMIT $2
            ",
        )
        .bind(MAX_DISPATCH_ATTEMPTS)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Mark an event dispatched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_processed(&self, id: i64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE outbox_event SET processed_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Record a failed dispatch attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE outbox_event SET attempts = attempts + 1, last_error = $1 WHERE id = $2")
            .bind(error)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
