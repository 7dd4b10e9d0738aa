//! HTTP middleware and extractors.
//!
//! - Bearer-token auth extractors ([`auth`])
//! - Per-IP rate limiting for the auth endpoints ([`rate_limit`])

pub mod auth;
pub mod rate_limit;

pub use auth::{OptionalUser, RequireAdmin, RequireUser, client_device};
pub use rate_limit::auth_rate_limiter;
