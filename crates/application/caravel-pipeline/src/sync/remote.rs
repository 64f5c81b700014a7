use std::sync::Arc;

use caravel_core::listing::{parse_listing, ListingFormat};
use caravel_core::RemoteInventory;
use caravel_infra::remote::RemoteStore;
use tracing::info;

use crate::sync::SyncError;

#[async_trait::async_trait]
pub trait RemoteInventoryProvider: Send + Sync {
    async fn fetch(&self) -> Result<RemoteInventory, SyncError>;
}

/// Builds the remote inventory from the endpoint's directory listing. A
/// listing failure is fatal for the run; without it no inventory exists.
pub struct ListingInventoryProvider {
    store: Arc<dyn RemoteStore>,
    format: ListingFormat,
}

impl ListingInventoryProvider {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            format: ListingFormat::default(),
        }
    }

    pub fn with_format(store: Arc<dyn RemoteStore>, format: ListingFormat) -> Self {
        Self { store, format }
    }
}

#[async_trait::async_trait]
impl RemoteInventoryProvider for ListingInventoryProvider {
    async fn fetch(&self) -> Result<RemoteInventory, SyncError> {
        let raw = self
            .store
            .list()
            .await
            .map_err(|e| SyncError::Remote(format!("listing failed: {e}")))?;
        let inventory = parse_listing(&raw, &self.format);
        info!("remote inventory holds {} entries", inventory.len());
        Ok(inventory)
    }
}
