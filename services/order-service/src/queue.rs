//! Queue publisher
//!
//! Messages go straight to a named durable queue through the default
//! exchange, with the queue name as routing key.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::redact_url;

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT_DELIVERY: u8 = 2;

/// Failures reported by a queue backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("broker unreachable: {0}")]
    Unavailable(String),

    #[error("broker call timed out after {0:?}")]
    Timeout(Duration),

    #[error("broker rejected the request: {0}")]
    Rejected(String),

    #[error("broker negatively acknowledged a message on queue {queue}")]
    Nacked { queue: String },
}

/// At-least-once delivery to a named durable queue.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Declare `name`. Idempotent for identical arguments.
    async fn ensure_queue(&self, name: &str, durable: bool) -> Result<(), QueueError>;

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError>;
}

/// RabbitMQ publisher over a single long-lived connection and channel.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    confirms: bool,
}

impl AmqpPublisher {
    /// Open the connection and channel.
    ///
    /// With `confirms` the channel runs in confirm mode and `publish` waits
    /// for the broker's ack.
    pub async fn connect(uri: &str, confirms: bool) -> Result<Self, QueueError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(map_lapin_error)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(map_lapin_error)?;

        if confirms {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(map_lapin_error)?;
        }

        info!(uri = %redact_url(uri), confirms, "Connected to AMQP broker");
        Ok(Self {
            connection,
            channel,
            confirms,
        })
    }

    /// Release the channel and connection.
    pub async fn close(&self) {
        if let Err(err) = self.channel.close(200, "shutdown").await {
            warn!(error = %err, "Failed to close AMQP channel");
        }
        if let Err(err) = self.connection.close(200, "shutdown").await {
            warn!(error = %err, "Failed to close AMQP connection");
        }
        info!("AMQP connection closed");
    }
}

#[async_trait]
impl QueuePublisher for AmqpPublisher {
    async fn ensure_queue(&self, name: &str, durable: bool) -> Result<(), QueueError> {
        let options = QueueDeclareOptions {
            durable,
            exclusive: false,
            auto_delete: false,
            ..QueueDeclareOptions::default()
        };
        self.channel
            .queue_declare(name, options, FieldTable::default())
            .await
            .map_err(map_lapin_error)?;
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError> {
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT_DELIVERY)
            .with_content_type("application/json".into());

        let confirm = self
            .channel
            .basic_publish("", queue, BasicPublishOptions::default(), body, properties)
            .await
            .map_err(map_lapin_error)?;

        if self.confirms {
            let confirmation = confirm.await.map_err(map_lapin_error)?;
            if confirmation.is_nack() {
                return Err(QueueError::Nacked {
                    queue: queue.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn map_lapin_error(err: lapin::Error) -> QueueError {
    match err {
        lapin::Error::ProtocolError(amqp) => QueueError::Rejected(amqp.to_string()),
        other => QueueError::Unavailable(other.to_string()),
    }
}

#[derive(Debug, Default)]
struct MemoryQueueState {
    durable: bool,
    messages: Vec<Vec<u8>>,
}

/// In-process broker for local runs and tests.
///
/// Mirrors the broker rules the ingestion path relies on: re-declaring a
/// queue with the same durability is a no-op, re-declaring with different
/// durability is refused, and messages for an undeclared queue are dropped.
#[derive(Default)]
pub struct MemoryQueue {
    queues: DashMap<String, MemoryQueueState>,
    ensure_calls: AtomicUsize,
    publish_calls: AtomicUsize,
    failure: Mutex<Option<QueueError>>,
    latency_ms: AtomicU64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `err` (or succeed again with `None`).
    pub fn fail_with(&self, err: Option<QueueError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = err;
        }
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    pub fn is_durable(&self, name: &str) -> Option<bool> {
        self.queues.get(name).map(|q| q.durable)
    }

    /// Snapshot of the messages currently sitting on `name`.
    pub fn messages(&self, name: &str) -> Vec<Vec<u8>> {
        self.queues
            .get(name)
            .map(|q| q.messages.clone())
            .unwrap_or_default()
    }

    async fn simulate(&self) -> Result<(), QueueError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        match self.failure.lock() {
            Ok(failure) => failure.clone().map_or(Ok(()), Err),
            Err(_) => Err(QueueError::Unavailable("queue state poisoned".to_string())),
        }
    }
}

#[async_trait]
impl QueuePublisher for MemoryQueue {
    async fn ensure_queue(&self, name: &str, durable: bool) -> Result<(), QueueError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        let queue = self
            .queues
            .entry(name.to_string())
            .or_insert_with(|| MemoryQueueState {
                durable,
                messages: Vec::new(),
            });
        if queue.durable != durable {
            return Err(QueueError::Rejected(format!(
                "PRECONDITION_FAILED - inequivalent arg 'durable' for queue '{name}'"
            )));
        }
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        match self.queues.get_mut(queue) {
            Some(mut state) => {
                state.messages.push(body.to_vec());
                debug!(queue, bytes = body.len(), "Published message in memory");
            }
            None => warn!(queue, "Dropping message for undeclared queue"),
        }
        Ok(())
    }
}
