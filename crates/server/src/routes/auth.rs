//! Authentication route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use clementine_core::SessionId;

use crate::error::Result;
use crate::middleware::{RequireUser, auth_rate_limiter, client_device};
use crate::models::{Session, UserProfile};
use crate::services::AuthService;
use crate::state::AppState;

/// Build the auth router, rate limited as a unit.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .route("/me", get(me))
        .route("/sessions", get(sessions))
        .route("/sessions/{id}", delete(revoke_session))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-otp", post(verify_otp))
        .route("/reset-password", post(reset_password))
        .layer(auth_rate_limiter())
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Register a new account.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    let device = client_device(&headers);

    let authenticated = auth
        .register(&body.name, &body.email, &body.password, &device)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserProfile::from(&authenticated.user),
            access_token: authenticated.tokens.access_token,
            refresh_token: authenticated.tokens.refresh_token,
        }),
    ))
}

/// Password login.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    let device = client_device(&headers);

    let authenticated = auth.login(&body.email, &body.password, &device).await?;

    Ok(Json(AuthResponse {
        user: UserProfile::from(&authenticated.user),
        access_token: authenticated.tokens.access_token,
        refresh_token: authenticated.tokens.refresh_token,
    }))
}

/// Rotate a refresh token into a fresh pair.
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    let pair = auth.refresh(&body.refresh_token).await?;

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// End the session behind the presented refresh token.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<Value>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    auth.logout(&body.refresh_token).await?;

    Ok(Json(json!({ "message": "logged out" })))
}

/// End every session of the current user.
#[instrument(skip_all)]
pub async fn logout_all(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Value>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    let revoked = auth.logout_all(user.id).await?;

    Ok(Json(
        json!({ "message": "logged out from all devices", "revoked": revoked }),
    ))
}

/// Current account profile.
#[instrument(skip_all)]
pub async fn me(RequireUser(user): RequireUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

/// List active sessions for the current user.
#[instrument(skip_all)]
pub async fn sessions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Session>>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    Ok(Json(auth.sessions(user.id).await?))
}

/// Revoke one session by id.
#[instrument(skip(state, user))]
pub async fn revoke_session(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
) -> Result<Json<Value>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    auth.revoke_session(SessionId::new(id), user.id).await?;

    Ok(Json(json!({ "message": "session revoked" })))
}

/// Request a password reset OTP.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    auth.forgot_password(&body.email).await?;

    Ok(Json(json!({ "message": "OTP sent to your email" })))
}

/// Pre-validate an OTP without consuming it.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<Value>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    auth.verify_otp(&body.email, &body.otp).await?;

    Ok(Json(json!({ "message": "OTP verified" })))
}

/// Complete a password reset; all sessions are invalidated.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    let auth = AuthService::new(state.pool(), state.tokens(), state.mailer());
    auth.reset_password(&body.email, &body.otp, &body.new_password)
        .await?;

    Ok(Json(json!({ "message": "password reset successfully" })))
}
