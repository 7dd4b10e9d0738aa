//! Authentication service.
//!
//! Password login with lockout, JWT issue/refresh with per-device session
//! rows, session revocation, and OTP-based password reset.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use sqlx::PgPool;

use clementine_core::{Email, SessionId, UserId, UserRole};

use crate::db::users::UserRepository;
use crate::db::{PasswordResetRepository, RepositoryError, SessionRepository};
use crate::models::{DeviceInfo, Session, User};
use crate::services::email::EmailService;
use crate::services::tokens::{TokenPair, TokenService, hash_token};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Failed logins before the account locks.
const MAX_LOGIN_ATTEMPTS: i32 = 5;

/// How long a lockout lasts.
const LOCKOUT_MINUTES: i64 = 15;

/// How long a password reset OTP stays valid.
const OTP_TTL_MINUTES: i64 = 10;

/// Wrong OTP entries before the request is discarded.
const MAX_OTP_ATTEMPTS: i32 = 3;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    sessions: SessionRepository<'a>,
    resets: PasswordResetRepository<'a>,
    tokens: &'a TokenService,
    mailer: Option<&'a EmailService>,
}

/// Result of a successful login or registration.
pub struct Authenticated {
    pub user: User,
    pub tokens: TokenPair,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        tokens: &'a TokenService,
        mailer: Option<&'a EmailService>,
    ) -> Self {
        Self {
            users: UserRepository::new(pool),
            sessions: SessionRepository::new(pool),
            resets: PasswordResetRepository::new(pool),
            tokens,
            mailer,
        }
    }

    // =========================================================================
    // Registration & Login
    // =========================================================================

    /// Register a new customer account and open its first session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` / `AuthError::WeakPassword` on bad
    /// input and `AuthError::UserAlreadyExists` for a taken email.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        device: &DeviceInfo,
    ) -> Result<Authenticated, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(name.trim(), &email, &password_hash, UserRole::Customer)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        let tokens = self.open_session(user.id, device).await?;
        Ok(Authenticated { user, tokens })
    }

    /// Login with email and password.
    ///
    /// Wrong passwords count toward lockout; a successful login clears the
    /// counter and stamps `last_login`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials`, `AuthError::AccountLocked`,
    /// or `AuthError::AccountDisabled` as appropriate.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: &DeviceInfo,
    ) -> Result<Authenticated, AuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let now = Utc::now();
        if user.is_locked(now) {
            return Err(AuthError::AccountLocked);
        }
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if verify_password(password, &password_hash).is_err() {
            let attempts = self.users.record_login_failure(user.id).await?;
            if attempts >= MAX_LOGIN_ATTEMPTS {
                self.users
                    .lock_account(user.id, now + Duration::minutes(LOCKOUT_MINUTES))
                    .await?;
                tracing::warn!(user_id = %user.id, "account locked after repeated login failures");
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.users.record_login_success(user.id).await?;

        let tokens = self.open_session(user.id, device).await?;
        Ok(Authenticated { user, tokens })
    }

    // =========================================================================
    // Token Refresh & Revocation
    // =========================================================================

    /// Exchange a refresh token for a fresh pair, rotating the session.
    ///
    /// The stored digest is overwritten in the same operation, so the
    /// presented token is unusable from this point on; replaying it (or
    /// any previously rotated token) fails with `SessionNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` for a bad token and
    /// `AuthError::SessionNotFound` when no active session matches.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let user_id = self.tokens.verify_refresh(refresh_token)?;

        let session = self
            .sessions
            .find_active(user_id, &hash_token(refresh_token), Utc::now())
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let pair = self.tokens.issue_pair(user_id)?;
        self.sessions
            .rotate(session.id, &hash_token(&pair.refresh_token))
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::SessionNotFound,
                other => AuthError::Repository(other),
            })?;

        Ok(pair)
    }

    /// Logout the device that presented this refresh token.
    ///
    /// Deliberately succeeds even for unknown tokens; logout is
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database fails.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if let Ok(user_id) = self.tokens.verify_refresh(refresh_token) {
            self.sessions
                .deactivate_by_hash(user_id, &hash_token(refresh_token))
                .await?;
        }
        Ok(())
    }

    /// Logout every device of a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database fails.
    pub async fn logout_all(&self, user_id: UserId) -> Result<u64, AuthError> {
        Ok(self.sessions.deactivate_all(user_id).await?)
    }

    /// List the user's active sessions.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database fails.
    pub async fn sessions(&self, user_id: UserId) -> Result<Vec<Session>, AuthError> {
        Ok(self.sessions.list_active(user_id).await?)
    }

    /// Revoke one session by id, owner-scoped.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionNotFound` if the session isn't the
    /// user's.
    pub async fn revoke_session(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<(), AuthError> {
        self.sessions
            .deactivate(session_id, user_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::SessionNotFound,
                other => AuthError::Repository(other),
            })
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Start a password reset: generate an OTP, store its digest, email
    /// the code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` for an unknown email and
    /// `AuthError::EmailDelivery` when mail cannot be sent.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let mailer = self
            .mailer
            .ok_or_else(|| AuthError::EmailDelivery("email is not configured".to_owned()))?;

        let otp = generate_otp();
        self.resets
            .replace_for_user(
                user.id,
                &hash_token(&otp),
                Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
            )
            .await?;

        mailer
            .send_password_reset_otp(user.email.as_str(), &user.name, &otp)
            .await
            .map_err(|e| AuthError::EmailDelivery(e.to_string()))?;

        Ok(())
    }

    /// Check an OTP without consuming it (UI pre-validation step).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OtpExpired`, `AuthError::TooManyOtpAttempts`,
    /// or `AuthError::OtpInvalid`.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<(), AuthError> {
        let user = self.user_by_email(email).await?;
        self.check_otp(user.id, otp).await.map(|_| ())
    }

    /// Complete a password reset: consume the OTP, store the new hash, and
    /// forcibly end every session of the user.
    ///
    /// # Errors
    ///
    /// Returns the same OTP errors as [`Self::verify_otp`] plus
    /// `AuthError::WeakPassword`.
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let user = self.user_by_email(email).await?;
        let reset_id = self.check_otp(user.id, otp).await?;

        let password_hash = hash_password(new_password)?;
        self.users.set_password(user.id, &password_hash).await?;
        self.resets.mark_used(reset_id).await?;

        // A reset invalidates every device, including whoever requested it.
        self.sessions.deactivate_all(user.id).await?;

        if let Some(mailer) = self.mailer
            && let Err(e) = mailer
                .send_password_changed(user.email.as_str(), &user.name)
                .await
        {
            tracing::warn!(error = %e, "failed to send password-changed confirmation");
        }

        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Issue a token pair and record the session row for it.
    async fn open_session(
        &self,
        user_id: UserId,
        device: &DeviceInfo,
    ) -> Result<TokenPair, AuthError> {
        let pair = self.tokens.issue_pair(user_id)?;
        self.sessions
            .create(
                user_id,
                &hash_token(&pair.refresh_token),
                device,
                pair.refresh_expires_at,
            )
            .await?;
        Ok(pair)
    }

    async fn user_by_email(&self, email: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        self.users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Validate an OTP against the user's live reset request and return
    /// the request id. Wrong codes count toward the attempt cap.
    async fn check_otp(&self, user_id: UserId, otp: &str) -> Result<i32, AuthError> {
        let reset = self
            .resets
            .find_active(user_id, Utc::now())
            .await?
            .ok_or(AuthError::OtpExpired)?;

        if reset.attempts >= MAX_OTP_ATTEMPTS {
            self.resets.delete(reset.id).await?;
            return Err(AuthError::TooManyOtpAttempts);
        }

        if reset.otp_hash != hash_token(otp) {
            self.resets.record_attempt(reset.id).await?;
            return Err(AuthError::OtpInvalid);
        }

        Ok(reset.id)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a 6-digit one-time code.
fn generate_otp() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(verify_password("wrong password", &hash).is_err());
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough password").is_ok());
    }

    #[test]
    fn test_otp_shape() {
        for _ in 0..20 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
