use camino::Utf8Path;
use caravel_core::LocalInventory;
use tracing::warn;
use walkdir::WalkDir;

use crate::sync::SyncError;

#[async_trait::async_trait]
pub trait LocalInventoryProvider: Send + Sync {
    async fn scan(&self, root: &Utf8Path) -> Result<LocalInventory, SyncError>;
}

/// Non-recursive scan of the sync directory: files only, keyed by bare file
/// name, sized by the metadata byte length at the instant of scanning. No
/// snapshot isolation against concurrent external mutation.
pub struct DirInventoryProvider;

#[async_trait::async_trait]
impl LocalInventoryProvider for DirInventoryProvider {
    async fn scan(&self, root: &Utf8Path) -> Result<LocalInventory, SyncError> {
        let root = root.to_owned();
        tokio::task::spawn_blocking(move || {
            let mut inventory = LocalInventory::new();
            if !root.as_std_path().is_dir() {
                // First run into a fresh directory; the dispatcher creates it
                // before writing.
                return Ok(inventory);
            }

            for entry in WalkDir::new(root.as_std_path()).min_depth(1).max_depth(1) {
                let entry =
                    entry.map_err(|e| SyncError::Local(format!("scan of {root} failed: {e}")))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = match entry.file_name().to_str() {
                    Some(n) => n.to_string(),
                    None => {
                        warn!("skipping non-UTF-8 file name {:?}", entry.file_name());
                        continue;
                    }
                };
                let meta = entry
                    .metadata()
                    .map_err(|e| SyncError::Local(format!("stat of {name} failed: {e}")))?;
                inventory.insert(name, meta.len());
            }
            Ok(inventory)
        })
        .await
        .map_err(|e| SyncError::Local(format!("scan join failed: {e}")))?
    }
}
