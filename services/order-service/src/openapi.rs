//! OpenAPI document for the order service.

use std::sync::OnceLock;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Order Service API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Creates orders, persists them to the key-value store and announces them on the order queue."
    ),
    paths(
        crate::handlers::order::create_order,
        crate::handlers::health::health,
        crate::handlers::docs::get_openapi_json,
    ),
    components(schemas(
        order_types::order::NewOrder,
        order_types::order::OrderRecord,
        crate::models::ErrorResponse,
        crate::models::HealthResponse,
    )),
    tags(
        (name = "Orders", description = "Order ingestion"),
        (name = "Health", description = "Liveness"),
        (name = "OpenAPI", description = "API description"),
    )
)]
pub struct OrderServiceApiDoc;

static OPENAPI_JSON_CACHE: OnceLock<String> = OnceLock::new();

/// Generated document, serialized once and cached.
pub fn openapi_json() -> Result<String, serde_json::Error> {
    if let Some(spec) = OPENAPI_JSON_CACHE.get() {
        return Ok(spec.clone());
    }

    let spec = serde_json::to_string_pretty(&OrderServiceApiDoc::openapi())?;
    let _ = OPENAPI_JSON_CACHE.set(spec.clone());
    Ok(spec)
}
