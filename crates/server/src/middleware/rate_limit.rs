//! Rate limiting for the authentication endpoints.
//!
//! Login, registration, and password reset are the brute-forceable
//! surface; they get a strict per-IP limiter. The rest of the API relies
//! on ordinary capacity limits.

use std::sync::Arc;

use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

/// Rate limiter layer type for the auth router.
pub type AuthRateLimiterLayer =
    GovernorLayer<SmartIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create the auth-route limiter: roughly 10 requests per minute per IP
/// (1 token replenished every 6 seconds, burst of 5).
///
/// # Panics
///
/// Will not panic: `per_second(6)` / `burst_size(5)` are always accepted
/// by `GovernorConfigBuilder`.
#[must_use]
pub fn auth_rate_limiter() -> AuthRateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}
