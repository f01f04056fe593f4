//! Error types for order construction
//!
//! Validation failures carry no side effects; the caller can resubmit
//! corrected input.

use thiserror::Error;

/// Order validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field must not be empty: {field}")]
    EmptyField { field: &'static str },

    #[error("Order id must not be empty")]
    EmptyId,

    #[error("Order id contains unsupported character {ch:?}")]
    InvalidId { ch: char },

    #[error("Quantity must be at least 1, got {quantity}")]
    NonPositiveQuantity { quantity: i32 },

    #[error("Price must not be negative, got {price}")]
    NegativePrice { price: String },
}

impl ValidationError {
    /// Name of the offending request field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyField { field } => field,
            ValidationError::EmptyId | ValidationError::InvalidId { .. } => "id",
            ValidationError::NonPositiveQuantity { .. } => "quantity",
            ValidationError::NegativePrice { .. } => "price",
        }
    }
}
