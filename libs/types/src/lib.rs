//! Types library for the order ingestion service
//!
//! # Modules
//! - `ids`: Order identifiers
//! - `order`: Inbound payload, validated record, validation policy
//! - `errors`: Validation error taxonomy

pub mod errors;
pub mod ids;
pub mod order;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::order::*;
}
