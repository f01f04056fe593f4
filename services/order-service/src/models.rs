use serde::Serialize;
use utoipa::ToSchema;

/// Error body returned for every non-2xx response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `STORE_UNAVAILABLE`.
    pub error: String,
    pub message: String,
    /// Offending request field, for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Id of an order that was stored but not announced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
