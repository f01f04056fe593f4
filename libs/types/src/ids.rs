//! Unique identifier types for order entities
//!
//! Server-minted IDs use UUID v7 for time-sortable ordering. Caller-supplied
//! IDs are accepted as opaque strings.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for an order
///
/// Serves as the key-value store key and as the resource locator in the
/// `Location` header. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, example = "01912e4c-7f3a-7cc2-9d8e-4b1f0a3e5c21")]
pub struct OrderId(String);

impl OrderId {
    /// Mint a new OrderId with current timestamp
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Accept a caller-supplied identifier
    ///
    /// The id becomes a single path segment of the resource locator, so it
    /// must be visible ASCII without `/`, `?` or `#`.
    pub fn parse(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if let Some(ch) = id
            .chars()
            .find(|c| !c.is_ascii_graphic() || matches!(c, '/' | '?' | '#'))
        {
            return Err(ValidationError::InvalidId { ch });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
