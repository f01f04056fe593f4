//! End-to-end tests for `POST /orders`
//!
//! Drives the full router against the in-process store and queue:
//! - Created response shape and Location header
//! - Store entry and queue message carry identical bytes
//! - Store failure never reaches the queue
//! - Queue failure or timeout leaves a retrievable store entry
//! - Decimal prices keep every digit
//! - Concurrent requests do not mix fields

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::future::join_all;
use order_service::ingestion::{DEFAULT_QUEUE_NAME, IngestionService, IngestionSettings};
use order_service::queue::{MemoryQueue, QueueError};
use order_service::router::create_router;
use order_service::state::AppState;
use order_service::store::{MemoryStore, OrderStore, StoreError};
use order_types::order::{OrderRecord, ValidationPolicy};
use serde_json::{Value, json};
use tower::ServiceExt;

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    broker: Arc<MemoryQueue>,
}

fn harness_with(settings: IngestionSettings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let broker = Arc::new(MemoryQueue::new());
    let ingestion = IngestionService::new(store.clone(), broker.clone(), settings);
    Harness {
        app: create_router(AppState::new(ingestion)),
        store,
        broker,
    }
}

fn harness() -> Harness {
    harness_with(IngestionSettings::default())
}

fn post_order(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec();
    (status, location, body)
}

fn ada_widget() -> Value {
    json!({ "customerName": "Ada", "product": "Widget", "quantity": 2, "price": 9.99 })
}

#[tokio::test]
async fn test_create_order_returns_created_with_location() {
    let h = harness();

    let (status, location, body) = send(&h.app, post_order(&ada_widget())).await;

    assert_eq!(status, StatusCode::CREATED);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let id = json["id"].as_str().expect("generated id");
    assert!(!id.is_empty());
    assert_eq!(location.as_deref(), Some(format!("/orders/{id}").as_str()));
    assert_eq!(json["customerName"], "Ada");
    assert_eq!(json["product"], "Widget");
    assert_eq!(json["quantity"], 2);
    assert_eq!(json["price"], 9.99);
}

#[tokio::test]
async fn test_store_and_queue_receive_identical_bytes() {
    let h = harness();

    let (status, _, body) = send(&h.app, post_order(&ada_widget())).await;
    assert_eq!(status, StatusCode::CREATED);

    let record = OrderRecord::from_json_bytes(&body).unwrap();
    let stored = h.store.get(record.id.as_str()).await.unwrap().expect("stored entry");
    let messages = h.broker.messages(DEFAULT_QUEUE_NAME);

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0], stored);
    assert_eq!(stored, body);
    assert_eq!(h.broker.is_durable(DEFAULT_QUEUE_NAME), Some(true));
}

#[tokio::test]
async fn test_high_precision_price_is_returned_and_stored_unchanged() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"id":"precise-1","customerName":"Ada","product":"Widget","quantity":1,"price":12345678901234.56789}"#,
        ))
        .unwrap();

    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::CREATED);
    let expected = br#"{"id":"precise-1","customerName":"Ada","product":"Widget","quantity":1,"price":12345678901234.56789}"#;
    assert_eq!(body, expected.to_vec());
    let stored = h.store.get("precise-1").await.unwrap().expect("stored entry");
    assert_eq!(stored, expected.to_vec());
    assert_eq!(h.broker.messages(DEFAULT_QUEUE_NAME), vec![expected.to_vec()]);
}

#[tokio::test]
async fn test_queue_timeout_returns_502_and_keeps_store_entry() {
    let h = harness_with(IngestionSettings {
        queue_timeout: Duration::from_millis(20),
        ..IngestionSettings::default()
    });
    h.broker.set_latency(Duration::from_millis(500));
    let mut order = ada_widget();
    order["id"] = json!("slow-broker-1");

    let (status, location, body) = send(&h.app, post_order(&order)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(location.is_none());
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "QUEUE_UNAVAILABLE");
    assert_eq!(json["orderId"], "slow-broker-1");
    assert!(h.store.get("slow-broker-1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_supplied_id_is_kept() {
    let h = harness();
    let mut order = ada_widget();
    order["id"] = json!("client-order-17");

    let (status, location, body) = send(&h.app, post_order(&order)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(location.as_deref(), Some("/orders/client-order-17"));
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["id"], "client-order-17");
    assert!(h.store.get("client-order-17").await.unwrap().is_some());
}

#[tokio::test]
async fn test_store_failure_returns_503_and_publishes_nothing() {
    let h = harness();
    h.store
        .fail_with(Some(StoreError::Unavailable("connection refused".to_string())));

    let (status, location, body) = send(&h.app, post_order(&ada_widget())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(location.is_none());
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "STORE_UNAVAILABLE");

    assert_eq!(h.store.put_calls(), 1);
    assert_eq!(h.broker.publish_calls(), 0);
    assert!(h.broker.messages(DEFAULT_QUEUE_NAME).is_empty());
}

#[tokio::test]
async fn test_queue_failure_returns_502_and_keeps_store_entry() {
    let h = harness();
    h.broker
        .fail_with(Some(QueueError::Unavailable("channel closed".to_string())));

    let (status, _, body) = send(&h.app, post_order(&ada_widget())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "QUEUE_UNAVAILABLE");
    let order_id = json["orderId"].as_str().expect("order id of stored entry");

    let stored = h.store.get(order_id).await.unwrap().expect("entry survives");
    let record = OrderRecord::from_json_bytes(&stored).unwrap();
    assert_eq!(record.customer_name, "Ada");
    assert_eq!(record.product, "Widget");
    assert_eq!(record.quantity, 2);
}

#[tokio::test]
async fn test_validation_failure_returns_400_without_side_effects() {
    let h = harness();
    let order = json!({ "customerName": "", "product": "Widget", "quantity": 2, "price": 9.99 });

    let (status, _, body) = send(&h.app, post_order(&order)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "VALIDATION_FAILED");
    assert_eq!(json["field"], "customerName");
    assert_eq!(h.store.put_calls(), 0);
    assert_eq!(h.broker.ensure_calls(), 0);
}

#[tokio::test]
async fn test_lenient_policy_accepts_negative_numbers() {
    let h = harness();
    let order = json!({ "customerName": "Ada", "product": "Widget", "quantity": -1, "price": -5 });

    let (status, _, _) = send(&h.app, post_order(&order)).await;

    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_strict_policy_rejects_negative_price() {
    let h = harness_with(IngestionSettings {
        policy: ValidationPolicy::Strict,
        ..IngestionSettings::default()
    });
    let order = json!({ "customerName": "Ada", "product": "Widget", "quantity": 1, "price": -5 });

    let (status, _, body) = send(&h.app, post_order(&order)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["field"], "price");
    assert_eq!(h.store.put_calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"customerName\": \"Ada\""))
        .unwrap();

    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "MALFORMED_REQUEST");
    assert_eq!(h.store.put_calls(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_do_not_cross_contaminate() {
    let h = harness();
    let orders: Vec<Value> = (0..16)
        .map(|i| {
            json!({
                "customerName": format!("customer-{i}"),
                "product": format!("product-{i}"),
                "quantity": i + 1,
                "price": 1.5
            })
        })
        .collect();

    let responses = join_all(orders.iter().map(|o| send(&h.app, post_order(o)))).await;

    let mut ids = HashSet::new();
    for (status, _, body) in responses {
        assert_eq!(status, StatusCode::CREATED);
        let record = OrderRecord::from_json_bytes(&body).unwrap();
        let n = record.quantity - 1;
        assert_eq!(record.customer_name, format!("customer-{n}"));
        assert_eq!(record.product, format!("product-{n}"));

        let stored = h.store.get(record.id.as_str()).await.unwrap().unwrap();
        assert_eq!(stored, body);
        ids.insert(record.id);
    }
    assert_eq!(ids.len(), 16);
    assert_eq!(h.store.len(), 16);

    let messages = h.broker.messages(DEFAULT_QUEUE_NAME);
    assert_eq!(messages.len(), 16);
    for message in messages {
        let record = OrderRecord::from_json_bytes(&message).unwrap();
        assert!(ids.contains(&record.id));
    }
}

#[tokio::test]
async fn test_health_and_openapi_routes() {
    let h = harness();

    let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(&h.app, health).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["status"], "ok");

    let docs = Request::builder().uri("/openapi.json").body(Body::empty()).unwrap();
    let (status, _, body) = send(&h.app, docs).await;
    assert_eq!(status, StatusCode::OK);
    let spec: Value = serde_json::from_slice(&body).unwrap();
    assert!(spec["paths"]["/orders"]["post"].is_object());
}
