//! Order ingestion
//!
//! Validates an inbound order, persists it, then announces it on the queue.
//!
//! Per request the order moves through
//! `Received → Validated → Stored → Published → Acknowledged`; any failure
//! ends the request. Nothing is retried or rolled back:
//! - a store failure means the queue is never touched, so consumers never
//!   hear about an order that was not persisted;
//! - a queue failure after a successful store write leaves the entry in the
//!   store with no notification, which reconciliation must pick up.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use order_types::errors::ValidationError;
use order_types::ids::OrderId;
use order_types::order::{NewOrder, OrderRecord, ValidationPolicy};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::queue::{QueueError, QueuePublisher};
use crate::store::{OrderStore, StoreError};

/// Queue that receives every created order.
pub const DEFAULT_QUEUE_NAME: &str = "order-queue";

/// Progress of a single request through the ingestion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    Received,
    Validated,
    Stored,
    Published,
    Acknowledged,
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IngestionStage::Received => "received",
            IngestionStage::Validated => "validated",
            IngestionStage::Stored => "stored",
            IngestionStage::Published => "published",
            IngestionStage::Acknowledged => "acknowledged",
        };
        f.write_str(label)
    }
}

/// Errors that end an ingestion request.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("invalid order: {0}")]
    Invalid(#[from] ValidationError),

    #[error("failed to encode order: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("order store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("order {order_id} was stored but could not be published: {source}")]
    QueueUnavailable {
        order_id: OrderId,
        #[source]
        source: QueueError,
    },
}

impl IngestionError {
    /// Last stage the request reached before failing.
    pub fn stage(&self) -> IngestionStage {
        match self {
            IngestionError::Invalid(_) => IngestionStage::Received,
            IngestionError::Encode(_) | IngestionError::StoreUnavailable(_) => {
                IngestionStage::Validated
            }
            IngestionError::QueueUnavailable { .. } => IngestionStage::Stored,
        }
    }
}

/// Tunables for [`IngestionService`].
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub queue_name: String,
    pub policy: ValidationPolicy,
    /// Upper bound on a single store call.
    pub store_timeout: Duration,
    /// Upper bound on queue declaration plus publish.
    pub queue_timeout: Duration,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            policy: ValidationPolicy::Lenient,
            store_timeout: Duration::from_secs(2),
            queue_timeout: Duration::from_secs(2),
        }
    }
}

/// Orchestrates validation, persistence and publication of new orders.
///
/// Holds no per-request state; share one instance behind an `Arc`.
pub struct IngestionService {
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn QueuePublisher>,
    settings: IngestionSettings,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        publisher: Arc<dyn QueuePublisher>,
        settings: IngestionSettings,
    ) -> Self {
        info!(
            queue = %settings.queue_name,
            policy = %settings.policy,
            store_timeout_ms = settings.store_timeout.as_millis() as u64,
            queue_timeout_ms = settings.queue_timeout.as_millis() as u64,
            "IngestionService initialized"
        );
        Self {
            store,
            publisher,
            settings,
        }
    }

    /// Declare the target queue.
    ///
    /// Called once at startup to fail fast; `create_order` declares again on
    /// every publish.
    pub async fn ensure_queue(&self) -> Result<(), QueueError> {
        let queue_timeout = self.settings.queue_timeout;
        bounded(
            queue_timeout,
            self.publisher.ensure_queue(&self.settings.queue_name, true),
            || QueueError::Timeout(queue_timeout),
        )
        .await
    }

    /// Create one order.
    ///
    /// On success the record is durably stored and a copy of the same bytes
    /// has been handed to the broker.
    pub async fn create_order(&self, request: NewOrder) -> Result<OrderRecord, IngestionError> {
        let started = Instant::now();

        let record = OrderRecord::from_request(request, self.settings.policy).map_err(|err| {
            debug!(field = err.field(), error = %err, "Rejected order");
            err
        })?;
        debug!(order_id = %record.id, stage = %IngestionStage::Validated, "Order validated");

        // One encoding for both sinks.
        let payload = record.to_json_bytes()?;

        let store_timeout = self.settings.store_timeout;
        if let Err(err) = bounded(
            store_timeout,
            self.store.put(record.id.as_str(), &payload),
            || StoreError::Timeout(store_timeout),
        )
        .await
        {
            error!(order_id = %record.id, error = %err, "Store write failed, skipping publish");
            return Err(IngestionError::StoreUnavailable(err));
        }
        debug!(order_id = %record.id, stage = %IngestionStage::Stored, "Order stored");

        if let Err(err) = self.announce(&payload).await {
            warn!(
                order_id = %record.id,
                queue = %self.settings.queue_name,
                error = %err,
                "Order stored but not published"
            );
            return Err(IngestionError::QueueUnavailable {
                order_id: record.id,
                source: err,
            });
        }
        debug!(order_id = %record.id, stage = %IngestionStage::Published, "Order published");

        info!(
            order_id = %record.id,
            stage = %IngestionStage::Acknowledged,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Order created"
        );
        Ok(record)
    }

    async fn announce(&self, payload: &[u8]) -> Result<(), QueueError> {
        let queue = self.settings.queue_name.as_str();
        let queue_timeout = self.settings.queue_timeout;
        bounded(
            queue_timeout,
            async {
                self.publisher.ensure_queue(queue, true).await?;
                self.publisher.publish(queue, payload).await
            },
            || QueueError::Timeout(queue_timeout),
        )
        .await
    }
}

/// Run `fut` with an upper bound, turning expiry into `on_timeout()`.
async fn bounded<T, E>(
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
