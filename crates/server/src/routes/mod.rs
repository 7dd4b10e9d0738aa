//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! POST   /api/auth/register          - Create account + first session
//! POST   /api/auth/login             - Password login
//! POST   /api/auth/refresh           - Rotate refresh token
//! POST   /api/auth/logout            - End the presenting device's session
//! POST   /api/auth/logout-all        - End every session
//! GET    /api/auth/me                - Current account
//! GET    /api/auth/sessions          - List active sessions
//! DELETE /api/auth/sessions/{id}     - Revoke one session
//! POST   /api/auth/forgot-password   - Send reset OTP
//! POST   /api/auth/verify-otp        - Pre-validate an OTP
//! POST   /api/auth/reset-password    - Reset password (ends all sessions)
//!
//! # Cart (guest or authenticated; guests keyed by X-Guest-Key)
//! GET    /api/cart                   - Get or lazily create the cart
//! POST   /api/cart/items             - Add line item
//! PUT    /api/cart/items/{id}        - Update quantity
//! DELETE /api/cart/items/{id}        - Remove line item
//! DELETE /api/cart                   - Clear cart
//! POST   /api/cart/coupon            - Apply coupon
//! DELETE /api/cart/coupon            - Remove coupon
//! POST   /api/cart/merge             - Fold a guest cart into the user's
//!
//! # Orders
//! POST   /api/orders                 - Create order from cart
//! GET    /api/orders                 - Admin listing (status filter, paging)
//! GET    /api/orders/mine            - Own order history
//! GET    /api/orders/{id}            - Order detail (owner or admin)
//! POST   /api/orders/{id}/payment-intent - Start paying
//! PUT    /api/orders/{id}/pay        - Confirm payment
//! PUT    /api/orders/{id}/status     - Admin status transition
//! PUT    /api/orders/{id}/cancel     - Cancel (owner or admin)
//! GET    /api/orders/{id}/invoice    - Invoice document
//!
//! # Catalog (read-only collaborator surface)
//! GET    /api/products               - Active products (paged)
//! GET    /api/products/{slug}        - Product detail
//!
//! # Notifications
//! GET    /api/notifications          - List (newest first)
//! GET    /api/notifications/unread-count
//! PUT    /api/notifications/{id}/read
//! PUT    /api/notifications/read-all
//! DELETE /api/notifications/{id}
//! ```

pub mod auth;
pub mod cart;
pub mod notifications;
pub mod orders;
pub mod products;

use axum::Router;

use crate::state::AppState;

/// Assemble the full API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/cart", cart::routes())
        .nest("/api/orders", orders::routes())
        .nest("/api/products", products::routes())
        .nest("/api/notifications", notifications::routes())
}
