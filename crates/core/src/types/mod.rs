//! Core types for Clementine.
//!
//! Type-safe wrappers for the domain concepts shared between the server
//! and the CLI.

pub mod email;
pub mod id;
pub mod status;
pub mod variant;

pub use email::{Email, EmailError};
pub use id::*;
pub use status::*;
pub use variant::VariantSelector;
