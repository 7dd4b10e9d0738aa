//! Catalog route handlers (read-only collaborator surface).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// Build the products router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{slug}", get(get_by_slug))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// List active products, paged.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let products = ProductRepository::new(state.pool());
    let items = products.list_active(limit, (page - 1) * limit).await?;
    let total = products.count_active().await?;

    Ok(Json(json!({
        "products": items,
        "page": page,
        "pages": (total as u64).div_ceil(limit as u64),
        "total": total,
    })))
}

/// Product detail by slug.
#[instrument(skip(state))]
pub async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("product not found".to_owned()))?;

    Ok(Json(product))
}
