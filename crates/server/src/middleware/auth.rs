//! Authentication extractors.
//!
//! Handlers take `RequireUser` / `RequireAdmin` / `OptionalUser` as
//! arguments. The extractor verifies the `Authorization: Bearer` access
//! token and loads the account, so handlers always see a live `User`, not
//! raw claims.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use crate::db::users::UserRepository;
use crate::error::AppError;
use crate::models::{DeviceInfo, User};
use crate::state::AppState;

/// Extractor that requires a logged-in, active account.
pub struct RequireUser(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(&parts.headers, state).await?;
        Ok(Self(user))
    }
}

/// Extractor that requires an admin account.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(&parts.headers, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("admin access required".to_owned()));
        }
        Ok(Self(user))
    }
}

/// Extractor that attaches the user when a valid token is presented, and
/// `None` otherwise (guest traffic).
pub struct OptionalUser(pub Option<User>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(&parts.headers, state).await.ok()))
    }
}

/// Verify the bearer token and load its account.
async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<User, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("not authorized, no token".to_owned()))?;

    let user_id = state
        .tokens()
        .verify_access(token)
        .map_err(|_| AppError::Unauthorized("invalid or expired token".to_owned()))?;

    let user = UserRepository::new(state.pool())
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("user not found".to_owned()))?;

    if !user.is_active {
        return Err(AppError::Unauthorized("account is deactivated".to_owned()));
    }

    Ok(user)
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Capture the device snapshot for a session row: user agent plus the
/// nearest client IP a proxy reported. Stored opaquely, never parsed.
#[must_use]
pub fn client_device(headers: &HeaderMap) -> DeviceInfo {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let ip = ["x-forwarded-for", "x-real-ip", "fly-client-ip"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_owned());

    DeviceInfo { user_agent, ip }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_non_bearer_schemes_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_client_device_takes_first_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("test-agent/1.0"),
        );
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );

        let device = client_device(&headers);
        assert_eq!(device.user_agent.as_deref(), Some("test-agent/1.0"));
        assert_eq!(device.ip.as_deref(), Some("203.0.113.9"));
    }
}
