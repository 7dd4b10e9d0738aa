//! Business logic services.
//!
//! Services are thin structs built per-request over borrowed repositories;
//! anything transactional owns the transaction itself.

pub mod auth;
pub mod cart;
pub mod email;
pub mod invoice;
pub mod notifications;
pub mod orders;
pub mod outbox;
pub mod payments;
pub mod tokens;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use email::{EmailError, EmailService};
pub use notifications::NotificationService;
pub use orders::{OrderError, OrderService};
pub use payments::{PaymentError, PaymentService};
pub use tokens::{TokenError, TokenPair, TokenService};
