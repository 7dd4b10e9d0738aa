//! Unified request-level error handling.
//!
//! Every route handler returns `Result<T, AppError>`. Service errors are
//! folded into `AppError` via `From` impls that decide the HTTP status and
//! the client-visible message; internal detail stays in the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AuthError, CartError, OrderError, PaymentError};

/// Application-level error for the REST API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input, with field-level detail.
    #[error("{0}")]
    BadRequest(String),

    /// Not authenticated (or stale/invalid credentials).
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The operation conflicts with current state (insufficient stock,
    /// illegal transition, duplicate email, ...).
    #[error("{0}")]
    Conflict(String),

    /// Account is temporarily locked.
    #[error("{0}")]
    Locked(String),

    /// An upstream collaborator (payment gateway, mail relay) failed.
    #[error("{0}")]
    Upstream(String),

    /// Anything we don't want to explain to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Locked(_) => StatusCode::LOCKED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Internal(_)) {
            tracing::error!(error = %self, "request failed");
        }

        // Internal detail never reaches the client.
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_owned(),
            other => other.to_string(),
        };

        (self.status(), Json(json!({ "message": message }))).into_response()
    }
}

/// Result type alias for route handlers.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("not found".to_owned()),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized("invalid credentials".to_owned()),
            AuthError::AccountLocked => Self::Locked(
                "account is locked after too many failed logins, try again later".to_owned(),
            ),
            AuthError::AccountDisabled => Self::Unauthorized("account is deactivated".to_owned()),
            AuthError::UserAlreadyExists => {
                Self::Conflict("an account with this email already exists".to_owned())
            }
            AuthError::UserNotFound => Self::NotFound("user not found".to_owned()),
            AuthError::InvalidEmail(e) => Self::BadRequest(format!("email: {e}")),
            AuthError::WeakPassword(msg) => Self::BadRequest(format!("password: {msg}")),
            AuthError::Token(_) => Self::Unauthorized("invalid or expired token".to_owned()),
            AuthError::SessionNotFound => {
                Self::Unauthorized("session not found or expired".to_owned())
            }
            AuthError::OtpInvalid => Self::BadRequest("invalid OTP".to_owned()),
            AuthError::OtpExpired => Self::BadRequest("OTP expired or invalid".to_owned()),
            AuthError::TooManyOtpAttempts => {
                Self::BadRequest("too many attempts, request a new OTP".to_owned())
            }
            AuthError::EmailDelivery(msg) => Self::Upstream(format!("email delivery: {msg}")),
            AuthError::PasswordHash => Self::Internal("password hashing failed".to_owned()),
            AuthError::Repository(e) => Self::from(e),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ProductNotFound => Self::NotFound("product not found".to_owned()),
            CartError::ItemNotFound => Self::NotFound("item not found in cart".to_owned()),
            CartError::InvalidQuantity => {
                Self::BadRequest("quantity: must be at least 1".to_owned())
            }
            CartError::InsufficientStock { .. }
            | CartError::CouponInvalid
            | CartError::MinPurchaseNotMet { .. } => Self::Conflict(err.to_string()),
            CartError::CouponNotFound => Self::NotFound("coupon not found".to_owned()),
            CartError::Repository(e) => Self::from(e),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(field) => {
                Self::BadRequest(format!("missing or empty field: {field}"))
            }
            OrderError::CartEmpty => Self::BadRequest("cart is empty".to_owned()),
            OrderError::NotFound => Self::NotFound("order not found".to_owned()),
            OrderError::Forbidden => Self::Forbidden("not authorized for this order".to_owned()),
            OrderError::InsufficientStock { .. }
            | OrderError::IllegalTransition { .. }
            | OrderError::NotCancellable(_)
            | OrderError::AlreadyPaid
            | OrderError::Conflict => Self::Conflict(err.to_string()),
            OrderError::PaymentDeclined => {
                Self::BadRequest("payment verification failed".to_owned())
            }
            OrderError::Payment(e) => Self::from(e),
            OrderError::Repository(e) => Self::from(e),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured(method) => {
                Self::BadRequest(format!("{method} payments are not available"))
            }
            other => Self::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(AppError::BadRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Unauthorized("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AppError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Conflict("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_state_errors_map_to_conflict() {
        assert_eq!(
            status_of(AppError::from(CartError::InsufficientStock { available: 2 })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::from(OrderError::NotCancellable(
                clementine_core::OrderStatus::Shipped
            ))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_replay_of_rotated_token_maps_to_unauthorized() {
        assert_eq!(
            status_of(AppError::from(AuthError::SessionNotFound)),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let response = AppError::Internal("connection string leaked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The body is built from the redacted message, not the original.
    }
}
