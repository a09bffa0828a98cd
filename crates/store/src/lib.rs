//! Persistence backends for OfferDesk.

pub mod in_memory;
pub mod sqlite;

use std::sync::Arc;
use offerdesk_config::StoreConfig;
use offerdesk_core::error::StoreError;
use offerdesk_core::store::{ConversationStore, FileStore, OfferStore};

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// One backend seen through each collaborator trait.
#[derive(Clone)]
pub struct Stores {
    pub conversations: Arc<dyn ConversationStore>,
    pub files: Arc<dyn FileStore>,
    pub offers: Arc<dyn OfferStore>,
}

impl Stores {
    /// Share a single backend across all three roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ConversationStore + FileStore + OfferStore + 'static,
    {
        Self {
            conversations: backend.clone(),
            files: backend.clone(),
            offers: backend,
        }
    }
}

/// Open the backend named in the configuration.
pub async fn open(config: &StoreConfig) -> Result<Stores, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Stores::from_backend(Arc::new(InMemoryStore::new()))),
        "sqlite" => {
            let path = config.sqlite_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Storage(format!("create {}: {e}", parent.display())))?;
            }
            let url = format!("sqlite://{}", path.display());
            Ok(Stores::from_backend(Arc::new(SqliteStore::new(&url).await?)))
        }
        other => Err(StoreError::Storage(format!("unknown store backend '{other}'"))),
    }
}
