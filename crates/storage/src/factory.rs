//! Factory for the configured record store

use crate::{RecordStore, SqliteRecordStore};
use dropwatch_core::{Result, StorageConfig};
use std::sync::Arc;
use tracing::info;

/// Open the SQLite store described by `config` and make sure its schema exists
pub async fn create_record_store(config: &StorageConfig) -> Result<Arc<dyn RecordStore>> {
    let store = SqliteRecordStore::connect(config).await?;
    store.initialize_tables().await?;
    info!(
        "Record store ready at {}",
        config.database_path.display()
    );
    Ok(Arc::new(store))
}
