//! User repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use clementine_core::{Email, UserId, UserRole};

use super::RepositoryError;
use crate::models::User;

const USER_COLUMNS: &str = "id, name, email, role, is_active, email_verified, \
     failed_login_attempts, locked_until, last_login, created_at, updated_at";

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    role: UserRole,
    is_active: bool,
    email_verified: bool,
    failed_login_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            role: row.role,
            is_active: row.is_active,
            email_verified: row.email_verified,
            failed_login_attempts: row.failed_login_attempts,
            locked_until: row.locked_until,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO "user" (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(name)
            .bind(email.as_str())
            .bind(password_hash)
            .bind(role)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("email already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        row.try_into()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE id = $1"#);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE email = $1"#);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let sql = format!(r#"SELECT {USER_COLUMNS}, password_hash FROM "user" WHERE email = $1"#);

        #[derive(sqlx::FromRow)]
        struct WithPassword {
            #[sqlx(flatten)]
            user: UserRow,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, WithPassword>(&sql)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some((r.user.try_into()?, r.password_hash))),
            None => Ok(None),
        }
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE "user" SET password_hash = $1, updated_at = now() WHERE id = $2"#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record a failed login attempt and return the new attempt count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn record_login_failure(&self, id: UserId) -> Result<i32, RepositoryError> {
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE "user"
            SET failed_login_attempts = failed_login_attempts + 1, updated_at = now()
            WHERE id = $1
            RETURNING failed_login_attempts
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        count.ok_or(RepositoryError::NotFound)
    }

    /// Lock an account until the given instant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_account(
        &self,
        id: UserId,
        until: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(r#"UPDATE "user" SET locked_until = $1, updated_at = now() WHERE id = $2"#)
            .bind(until)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Clear lockout state and stamp the last successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_login_success(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE "user"
            SET failed_login_attempts = 0, locked_until = NULL,
                last_login = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// IDs of every admin account (low-stock alert recipients).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn admin_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
        let ids: Vec<i32> =
            sqlx::query_scalar(r#"SELECT id FROM "user" WHERE role = 'admin' AND is_active"#)
                .fetch_all(self.pool)
                .await?;

        Ok(ids.into_iter().map(UserId::new).collect())
    }
}
