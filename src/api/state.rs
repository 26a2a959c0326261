use std::sync::Arc;

use crate::fleet::workshop::Workshop;
use crate::storage::Pool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub workshop: Arc<Workshop>,
}

impl AppState {
    pub fn new(pool: Pool, workshop: Workshop) -> Self {
        Self {
            pool,
            workshop: Arc::new(workshop),
        }
    }
}
