//! Builds the correction store selected by `[store].backend`.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use poster_labels_core::resolve::CorrectionResolver;
use poster_labels_core::store::memory::InMemoryCorrectionStore;
use poster_labels_core::store::CorrectionStore;

use crate::config::{Config, StoreBackend};
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteCorrectionStore;

/// Open the configured store, or `None` when learning is disabled.
///
/// The SQLite schema is brought up to date on open, so `posters init` is
/// optional.
pub async fn open_store(config: &Config) -> Result<Option<Arc<dyn CorrectionStore>>> {
    match config.store.backend()? {
        StoreBackend::Sqlite => {
            let pool = db::connect(config).await?;
            migrate::apply(&pool).await?;
            debug!(path = %config.db.path.display(), "opened sqlite correction store");
            Ok(Some(Arc::new(SqliteCorrectionStore::new(pool))))
        }
        StoreBackend::Memory => {
            info!("using in-memory correction store; corrections are not persisted");
            Ok(Some(Arc::new(InMemoryCorrectionStore::new())))
        }
        StoreBackend::Disabled => Ok(None),
    }
}

/// Open the configured store, failing when learning is disabled.
pub async fn require_store(config: &Config) -> Result<Arc<dyn CorrectionStore>> {
    match open_store(config).await? {
        Some(store) => Ok(store),
        None => anyhow::bail!(
            "No correction store is configured (store.backend = \"disabled\")"
        ),
    }
}

pub async fn open_resolver(config: &Config) -> Result<CorrectionResolver> {
    Ok(match open_store(config).await? {
        Some(store) => CorrectionResolver::new(store),
        None => CorrectionResolver::disabled(),
    })
}
