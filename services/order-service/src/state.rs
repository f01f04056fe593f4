use crate::ingestion::IngestionService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionService>,
}

impl AppState {
    pub fn new(ingestion: IngestionService) -> Self {
        Self {
            ingestion: Arc::new(ingestion),
        }
    }
}
