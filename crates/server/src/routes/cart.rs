//! Cart route handlers.
//!
//! Carts work for guests and authenticated users alike. An authenticated
//! request owns its cart by user id; a guest request presents an
//! `X-Guest-Key` header. When a guest arrives without one, the server
//! mints a key and echoes it back in the same header for the client to
//! keep.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use clementine_core::{CartItemId, ProductId, VariantSelector};

use crate::error::Result;
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::{Cart, CartOwner, User};
use crate::services::CartService;
use crate::state::AppState;

/// Header carrying the anonymous cart owner key.
const GUEST_KEY_HEADER: &str = "x-guest-key";

/// Build the cart router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/{id}", put(update_item).delete(remove_item))
        .route("/coupon", post(apply_coupon).delete(remove_coupon))
        .route("/merge", post(merge))
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: i32,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub variant: VariantSelector,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub guest_key: String,
}

/// Resolve the cart owner for this request, minting a guest key when an
/// anonymous request has none yet.
fn resolve_owner(user: Option<&User>, headers: &HeaderMap) -> (CartOwner, Option<String>) {
    if let Some(user) = user {
        return (CartOwner::User(user.id), None);
    }

    let presented = headers
        .get(GUEST_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty());

    match presented {
        Some(key) => (CartOwner::Guest(key.to_owned()), None),
        None => {
            let key = format!("guest_{}", Uuid::new_v4());
            (CartOwner::Guest(key.clone()), Some(key))
        }
    }
}

/// Serialize the cart, echoing a freshly minted guest key when present.
fn cart_response(cart: Cart, minted_key: Option<String>) -> Response {
    match minted_key {
        Some(key) => (AppendHeaders([(GUEST_KEY_HEADER, key)]), Json(cart)).into_response(),
        None => Json(cart).into_response(),
    }
}

/// Get (or lazily create) the requester's cart.
#[instrument(skip_all)]
pub async fn get_cart(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
) -> Result<Response> {
    let (owner, minted) = resolve_owner(user.as_ref(), &headers);
    let cart = CartService::new(state.pool()).get_or_create(&owner).await?;
    Ok(cart_response(cart, minted))
}

/// Add a line item.
#[instrument(skip(state, user, headers, body), fields(product_id = body.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
    Json(body): Json<AddItemRequest>,
) -> Result<Response> {
    let (owner, minted) = resolve_owner(user.as_ref(), &headers);
    let cart = CartService::new(state.pool())
        .add_item(
            &owner,
            ProductId::new(body.product_id),
            body.quantity,
            body.variant,
        )
        .await?;
    Ok(cart_response(cart, minted))
}

/// Update a line item's quantity.
#[instrument(skip(state, user, headers, body))]
pub async fn update_item(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Response> {
    let (owner, minted) = resolve_owner(user.as_ref(), &headers);
    let cart = CartService::new(state.pool())
        .update_item(&owner, CartItemId::new(id), body.quantity)
        .await?;
    Ok(cart_response(cart, minted))
}

/// Remove a line item.
#[instrument(skip(state, user, headers))]
pub async fn remove_item(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let (owner, minted) = resolve_owner(user.as_ref(), &headers);
    let cart = CartService::new(state.pool())
        .remove_item(&owner, CartItemId::new(id))
        .await?;
    Ok(cart_response(cart, minted))
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear_cart(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
) -> Result<Response> {
    let (owner, minted) = resolve_owner(user.as_ref(), &headers);
    let cart = CartService::new(state.pool()).clear(&owner).await?;
    Ok(cart_response(cart, minted))
}

/// Apply a coupon code.
#[instrument(skip(state, user, headers, body), fields(code = %body.code))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
    Json(body): Json<ApplyCouponRequest>,
) -> Result<Response> {
    let (owner, minted) = resolve_owner(user.as_ref(), &headers);
    let cart = CartService::new(state.pool())
        .apply_coupon(&owner, &body.code)
        .await?;
    Ok(cart_response(cart, minted))
}

/// Remove the applied coupon.
#[instrument(skip_all)]
pub async fn remove_coupon(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
) -> Result<Response> {
    let (owner, minted) = resolve_owner(user.as_ref(), &headers);
    let cart = CartService::new(state.pool()).remove_coupon(&owner).await?;
    Ok(cart_response(cart, minted))
}

/// Fold a guest cart into the authenticated user's cart (summing
/// quantities on product+variant match); the guest cart is discarded.
#[instrument(skip(state, user, body))]
pub async fn merge(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<MergeRequest>,
) -> Result<Json<Cart>> {
    let owner = CartOwner::User(user.id);
    let cart = CartService::new(state.pool())
        .merge_guest_cart(&body.guest_key, &owner)
        .await?;
    Ok(Json(cart))
}
