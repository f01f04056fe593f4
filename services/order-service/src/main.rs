use std::sync::Arc;

use order_service::config::Config;
use order_service::ingestion::IngestionService;
use order_service::queue::{AmqpPublisher, MemoryQueue, QueuePublisher};
use order_service::router::create_router;
use order_service::shutdown::shutdown_signal;
use order_service::state::AppState;
use order_service::store::{MemoryStore, OrderStore, RedisStore};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        version = order_service::SERVICE_VERSION,
        in_memory = config.in_memory,
        "Starting Order Service"
    );

    // One long-lived connection per backend, shared by all requests
    let mut amqp = None;
    let (store, publisher): (Arc<dyn OrderStore>, Arc<dyn QueuePublisher>) = if config.in_memory {
        tracing::warn!("ORDER_SERVICE_IN_MEMORY set; orders are kept in process only");
        (Arc::new(MemoryStore::new()), Arc::new(MemoryQueue::new()))
    } else {
        let store: Arc<dyn OrderStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
        let amqp_publisher = Arc::new(
            AmqpPublisher::connect(&config.amqp_url, config.publisher_confirms).await?,
        );
        amqp = Some(amqp_publisher.clone());
        let publisher: Arc<dyn QueuePublisher> = amqp_publisher;
        (store, publisher)
    };

    let ingestion = IngestionService::new(store, publisher, config.ingestion_settings());
    ingestion.ensure_queue().await?;

    let app = create_router(AppState::new(ingestion));

    let listener = TcpListener::bind(config.http_addr).await?;
    tracing::info!("Listening on {}", config.http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(publisher) = amqp {
        publisher.close().await;
    }
    tracing::info!("Order Service stopped");

    Ok(())
}
