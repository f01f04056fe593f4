//! Order record types
//!
//! An [`OrderRecord`] is built per request, written once to the key-value
//! store, published once to the queue, then dropped. Both sinks receive the
//! same encoded bytes from [`OrderRecord::to_json_bytes`].

use crate::errors::ValidationError;
use crate::ids::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// How numeric fields are checked when an order is built.
///
/// Text fields are always required to be non-blank. Numeric checks are
/// opt-in: `Lenient` accepts any integer quantity and any decimal price
/// (zero and negatives included), `Strict` rejects `quantity < 1` and
/// `price < 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    #[default]
    Lenient,
    Strict,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ValidationPolicy::Lenient),
            "strict" => Ok(ValidationPolicy::Strict),
            other => Err(format!("unknown validation policy '{other}' (expected lenient or strict)")),
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::Lenient => write!(f, "lenient"),
            ValidationPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Inbound order-creation payload
///
/// `id` is optional; when omitted the service mints one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub product: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    #[schema(value_type = f64, example = 9.99)]
    pub price: Decimal,
}

/// Validated, identified order
///
/// Field order is fixed so the JSON encoding is deterministic. `price` is
/// written as a JSON number carrying every digit of the decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_name: String,
    pub product: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    #[schema(value_type = f64, example = 9.99)]
    pub price: Decimal,
}

impl OrderRecord {
    /// Create a record with a freshly minted id
    ///
    /// Only the text fields are checked; use [`OrderRecord::from_request`]
    /// to apply a [`ValidationPolicy`].
    pub fn new(
        customer_name: impl Into<String>,
        product: impl Into<String>,
        quantity: i32,
        price: Decimal,
    ) -> Result<Self, ValidationError> {
        let record = Self {
            id: OrderId::generate(),
            customer_name: customer_name.into(),
            product: product.into(),
            quantity,
            price,
        };
        record.validate(ValidationPolicy::Lenient)?;
        Ok(record)
    }

    /// Build a record from an inbound request, honouring a supplied id
    pub fn from_request(
        request: NewOrder,
        policy: ValidationPolicy,
    ) -> Result<Self, ValidationError> {
        let id = match request.id {
            Some(id) => OrderId::parse(id)?,
            None => OrderId::generate(),
        };

        let record = Self {
            id,
            customer_name: request.customer_name,
            product: request.product,
            quantity: request.quantity,
            price: request.price,
        };
        record.validate(policy)?;
        Ok(record)
    }

    pub fn validate(&self, policy: ValidationPolicy) -> Result<(), ValidationError> {
        if self.customer_name.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "customerName" });
        }
        if self.product.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "product" });
        }

        if policy == ValidationPolicy::Strict {
            if self.quantity < 1 {
                return Err(ValidationError::NonPositiveQuantity {
                    quantity: self.quantity,
                });
            }
            if self.price.is_sign_negative() && !self.price.is_zero() {
                return Err(ValidationError::NegativePrice {
                    price: self.price.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Encode as compact JSON
    ///
    /// This is the only encoding used for both the store value and the
    /// queue message body.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a payload previously produced by [`OrderRecord::to_json_bytes`]
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
