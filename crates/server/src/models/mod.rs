//! Domain models for the Clementine server.

pub mod cart;
pub mod coupon;
pub mod order;
pub mod outbox;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{Cart, CartItem, CartOwner};
pub use coupon::Coupon;
pub use order::{NewOrder, Order, OrderItem, ShippingAddress};
pub use outbox::{OutboxEvent, PendingEvent};
pub use product::Product;
pub use session::{DeviceInfo, Session};
pub use user::{User, UserProfile};
