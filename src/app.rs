//! Wiring from [`Config`] to a ready-to-serve note service.

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, ConfigError, ServerConfig, StoreBackend, StoreConfig};
use crate::error::Result;
use crate::notes::{NoteService, Notes};
use crate::server::ServerOptions;
use crate::storage::DocumentStore;
use crate::store::{ConnectionString, CosmosStore, MemoryStore, PartitionedStore};

pub fn build_store(config: &StoreConfig) -> std::result::Result<Arc<dyn PartitionedStore>, ConfigError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new().with_page_size(config.page_size)))
        }
        StoreBackend::Cosmos => {
            let connection: ConnectionString = config
                .connection_string
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid("cosmos connection string is empty".to_string()))?
                .parse()?;
            info!(
                endpoint = %connection.endpoint,
                database = %config.database,
                container = %config.container,
                "using cosmos store"
            );
            let store = CosmosStore::new(&connection, &config.database, &config.container)?
                .with_page_size(config.page_size);
            Ok(Arc::new(store))
        }
    }
}

pub fn build_service(config: &Config) -> Result<Arc<dyn NoteService>> {
    let store = build_store(&config.store)?;
    let notes = Notes::builder()
        .storage(Arc::new(DocumentStore::new(store)))
        .timeout(config.notes.timeout())
        .build()?;
    Ok(Arc::new(notes))
}

pub fn server_options(config: &ServerConfig) -> ServerOptions {
    ServerOptions {
        addr: config.addr(),
        request_timeout: config.request_timeout(),
        shutdown_timeout: config.shutdown_timeout(),
    }
}
