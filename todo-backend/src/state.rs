/// Shared application state passed to axum handlers.
use std::sync::Arc;
use todo_core::store::memory::MemoryStore;
use todo_core::store::ListStorage;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ListStorage>,
    pub port: u16,
    pub bind_address: String,
}

impl AppState {
    pub fn new(storage: Arc<dyn ListStorage>, port: u16, bind_address: impl Into<String>) -> Self {
        Self {
            storage,
            port,
            bind_address: bind_address.into(),
        }
    }

    /// Fresh in-memory store seeded from the config's lists.
    pub fn from_config(config: &ServerConfig) -> Self {
        let storage = Arc::new(MemoryStore::with_lists(config.lists.iter().cloned()));
        Self::new(storage, config.port, config.bind_address.clone())
    }
}
