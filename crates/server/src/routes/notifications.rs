//! In-app notification route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use clementine_core::NotificationId;

use crate::db::NotificationRepository;
use crate::db::notifications::Notification;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Build the notifications router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/{id}/read", put(mark_read))
        .route("/read-all", put(mark_all_read))
        .route("/{id}", delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<i64>,
}

/// List the user's notifications, newest first.
#[instrument(skip(state, user))]
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>> {
    let notifications = NotificationRepository::new(state.pool());
    Ok(Json(
        notifications
            .list(user.id, query.unread, query.limit.unwrap_or(20))
            .await?,
    ))
}

/// Unread notification count.
#[instrument(skip_all)]
pub async fn unread_count(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Value>> {
    let count = NotificationRepository::new(state.pool())
        .unread_count(user.id)
        .await?;
    Ok(Json(json!({ "unread": count })))
}

/// Mark one notification read.
#[instrument(skip(state, user))]
pub async fn mark_read(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
) -> Result<Json<Value>> {
    NotificationRepository::new(state.pool())
        .mark_read(NotificationId::new(id), user.id)
        .await?;
    Ok(Json(json!({ "message": "notification marked read" })))
}

/// Mark everything read.
#[instrument(skip_all)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Value>> {
    let updated = NotificationRepository::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(Json(json!({ "message": "all notifications marked read", "updated": updated })))
}

/// Delete a notification.
#[instrument(skip(state, user))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
) -> Result<Json<Value>> {
    NotificationRepository::new(state.pool())
        .delete(NotificationId::new(id), user.id)
        .await?;
    Ok(Json(json!({ "message": "notification deleted" })))
}
