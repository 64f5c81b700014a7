use std::sync::Arc;

use camino::Utf8PathBuf;
use caravel_infra::remote::RemoteStore;

pub mod engine;
pub mod local;
pub mod remote;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub concurrency: usize,
    pub rate_limit_bytes: Option<u64>,
    /// Delete remote copies that are already safely replicated locally.
    pub purge_remote: bool,
    /// Re-scan and re-reconcile after the downloads to catch short writes.
    pub verify_after: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            rate_limit_bytes: None,
            purge_remote: false,
            verify_after: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub local_root: Utf8PathBuf,
    pub options: SyncOptions,
}

#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub files_missing: u64,
    pub files_mismatched: u64,
    pub bytes_planned: u64,
    pub files_downloaded: u64,
    pub bytes_downloaded: u64,
    pub files_purged: u64,
    pub purge_failures: u64,
    /// Download candidates still present after the verify pass.
    pub residual_after_verify: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SyncResult {
    pub plan: caravel_core::SyncPlan,
    pub executed: bool,
    pub stats: SyncStats,
}

/// High-level error type for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Remote fetch error: {0}")]
    Remote(String),
    #[error("Local state error: {0}")]
    Local(String),
    #[error("Execution error: {0}")]
    Execution(String),
}

pub use engine::MirrorEngine;
pub use local::{DirInventoryProvider, LocalInventoryProvider};
pub use remote::{ListingInventoryProvider, RemoteInventoryProvider};

/// Convenience constructor for the default engine.
pub fn default_engine(store: Arc<dyn RemoteStore>) -> MirrorEngine {
    MirrorEngine::new(store)
}
