//! Authentication error types.

use thiserror::Error;

use clementine_core::EmailError;

use crate::db::RepositoryError;
use crate::services::tokens::TokenError;

/// Errors from authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password. Deliberately indistinguishable from an
    /// unknown account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Too many failed logins; try again later.
    #[error("account is locked")]
    AccountLocked,

    /// The account has been deactivated.
    #[error("account is deactivated")]
    AccountDisabled,

    /// Registration with an email that is already taken.
    #[error("user already exists")]
    UserAlreadyExists,

    /// No account for the given email.
    #[error("user not found")]
    UserNotFound,

    /// The email address failed validation.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The password does not meet requirements.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// Password hashing failed.
    #[error("failed to hash password")]
    PasswordHash,

    /// A presented token failed verification.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// No active session matches the presented refresh token; covers
    /// expiry, revocation, and replay of a rotated token alike.
    #[error("session not found or expired")]
    SessionNotFound,

    /// The reset code is wrong.
    #[error("invalid OTP")]
    OtpInvalid,

    /// The reset code expired or was never requested.
    #[error("OTP expired or invalid")]
    OtpExpired,

    /// Too many wrong codes; a new one must be requested.
    #[error("too many attempts, request a new OTP")]
    TooManyOtpAttempts,

    /// Outbound email is not configured or failed.
    #[error("failed to send email: {0}")]
    EmailDelivery(String),

    /// Underlying storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
