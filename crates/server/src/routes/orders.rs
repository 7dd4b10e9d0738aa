//! Order route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use clementine_core::{OrderId, OrderStatus, PaymentMethod};

use crate::db::orders::OrderListQuery;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{Order, ShippingAddress};
use crate::services::invoice::render_invoice;
use crate::services::orders::{PlaceOrder, StatusUpdate};
use crate::services::payments::{PaymentConfirmation, PaymentIntent};
use crate::services::OrderService;
use crate::state::AppState;

/// Build the orders router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list_all))
        .route("/mine", get(list_mine))
        .route("/{id}", get(get_order))
        .route("/{id}/payment-intent", post(payment_intent))
        .route("/{id}/pay", put(pay))
        .route("/{id}/status", put(update_status))
        .route("/{id}/cancel", put(cancel))
        .route("/{id}/invoice", get(invoice))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

/// Create an order from the current cart.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let orders = OrderService::new(state.pool(), state.payments());
    let order = orders
        .create(
            &user,
            PlaceOrder {
                shipping_address: body.shipping_address,
                payment_method: body.payment_method,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// The requester's order history, newest first.
#[instrument(skip_all)]
pub async fn list_mine(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderService::new(state.pool(), state.payments());
    Ok(Json(orders.list_mine(user.id).await?))
}

/// Admin listing with optional status filter and pagination.
#[instrument(skip(state, _admin))]
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let orders = OrderService::new(state.pool(), state.payments());
    let (page_orders, total) = orders
        .list_all(OrderListQuery {
            status: query.status,
            page,
            limit,
        })
        .await?;

    Ok(Json(json!({
        "orders": page_orders,
        "page": page,
        "pages": (total as u64).div_ceil(limit as u64),
        "total": total,
    })))
}

/// Order detail, visible to the owner and admins.
#[instrument(skip(state, user))]
pub async fn get_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    let orders = OrderService::new(state.pool(), state.payments());
    Ok(Json(orders.get(OrderId::new(id), &user).await?))
}

/// Start paying for an order.
#[instrument(skip(state, user))]
pub async fn payment_intent(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
) -> Result<Json<PaymentIntent>> {
    let orders = OrderService::new(state.pool(), state.payments());
    Ok(Json(
        orders.create_payment_intent(OrderId::new(id), &user).await?,
    ))
}

/// Confirm payment after the gateway callback.
#[instrument(skip(state, user, body))]
pub async fn pay(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
    Json(body): Json<PaymentConfirmation>,
) -> Result<Json<Order>> {
    let orders = OrderService::new(state.pool(), state.payments());
    Ok(Json(orders.mark_paid(OrderId::new(id), &user, body).await?))
}

/// Admin status transition (validated against the legal table).
#[instrument(skip(state, _admin, body), fields(status = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Order>> {
    let orders = OrderService::new(state.pool(), state.payments());
    let order = orders
        .update_status(
            OrderId::new(id),
            StatusUpdate {
                status: body.status,
                tracking_number: body.tracking_number,
                notes: body.notes,
            },
        )
        .await?;

    Ok(Json(order))
}

/// Cancel an order; stock and sold counts are restored.
#[instrument(skip(state, user))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    let orders = OrderService::new(state.pool(), state.payments());
    Ok(Json(orders.cancel(OrderId::new(id), &user).await?))
}

/// Download the invoice document for an order.
#[instrument(skip(state, user))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
) -> Result<Response> {
    let orders = OrderService::new(state.pool(), state.payments());
    let order = orders.get(OrderId::new(id), &user).await?;

    // An admin may pull someone else's invoice; bill it to the owner.
    let customer = if order.user_id == user.id {
        user
    } else {
        crate::db::users::UserRepository::new(state.pool())
            .get_by_id(order.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("order owner not found".to_owned()))?
    };

    let html = render_invoice(&order, &customer)
        .map_err(|e| AppError::Internal(format!("invoice rendering failed: {e}")))?;

    let disposition = format!(
        "attachment; filename=\"invoice-{}.html\"",
        order.order_number
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        html,
    )
        .into_response())
}
