use std::sync::Arc;

use camino::Utf8Path;
use caravel_core::diff::reconcile;
use caravel_core::names::is_safe_name;
use caravel_core::{RemoteInventory, SyncPlan};
use caravel_infra::remote::RemoteStore;
use caravel_infra::transfer::{Dispatcher, TransferEvent, TransferItem};
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

use crate::sync::local::{DirInventoryProvider, LocalInventoryProvider};
use crate::sync::remote::{ListingInventoryProvider, RemoteInventoryProvider};
use crate::sync::{SyncError, SyncRequest, SyncResult, SyncStats};

pub struct MirrorEngine {
    remote: Box<dyn RemoteInventoryProvider>,
    local: Box<dyn LocalInventoryProvider>,
    store: Arc<dyn RemoteStore>,
}

impl MirrorEngine {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let remote = Box::new(ListingInventoryProvider::new(store.clone()));
        Self {
            remote,
            local: Box::new(DirInventoryProvider),
            store,
        }
    }

    pub fn with_components(
        remote: Box<dyn RemoteInventoryProvider>,
        local: Box<dyn LocalInventoryProvider>,
        store: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            remote,
            local,
            store,
        }
    }

    /// Pure planning step: fetch remote inventory, scan local, reconcile.
    pub async fn plan(&self, req: &SyncRequest) -> Result<SyncPlan, SyncError> {
        let remote_inv = self.remote.fetch().await?;
        let local_inv = self.local.scan(&req.local_root).await?;
        Ok(reconcile(&remote_inv, &local_inv))
    }

    /// Plan and execute: download the missing and mismatched sets, then
    /// optionally purge replicated remote copies and run a verification
    /// re-scan. Both inventories come from a single snapshot; the purge set
    /// in particular is never recomputed after the downloads land.
    pub async fn sync(
        &self,
        req: &SyncRequest,
        progress_tx: Option<Sender<TransferEvent>>,
    ) -> Result<SyncResult, SyncError> {
        let remote_inv = self.remote.fetch().await?;
        let local_inv = self.local.scan(&req.local_root).await?;
        let plan = reconcile(&remote_inv, &local_inv);

        let mut stats = SyncStats {
            files_missing: plan.missing.len() as u64,
            files_mismatched: plan.mismatched.len() as u64,
            bytes_planned: plan
                .downloads()
                .map(|n| remote_inv.get(n).map_or(0, |e| e.size))
                .sum(),
            ..SyncStats::default()
        };

        let mut executed = false;
        if plan.download_count() == 0 {
            info!("nothing to download");
        } else {
            info!(
                "downloading {} missing and {} mismatched files",
                plan.missing.len(),
                plan.mismatched.len()
            );
            let dispatcher = Dispatcher::new(
                self.store.clone(),
                req.options.concurrency,
                req.options.rate_limit_bytes,
            );
            // Missing and mismatched run as separate dispatcher invocations,
            // so each call gets its own fault domain.
            for batch in [&plan.missing, &plan.mismatched] {
                if batch.is_empty() {
                    continue;
                }
                let items = to_items(batch, &remote_inv);
                let batch_stats = dispatcher
                    .download_batch(items, &req.local_root, progress_tx.clone())
                    .await
                    .map_err(|e| SyncError::Execution(format!("download batch failed: {e}")))?;
                stats.files_downloaded += batch_stats.files_completed;
                stats.bytes_downloaded += batch_stats.bytes_downloaded;
            }
            executed = true;
        }

        if req.options.purge_remote {
            self.purge_with_plan(&plan, &mut stats).await;
            executed = executed || stats.files_purged > 0;
        }

        if req.options.verify_after {
            let residual = self.verify(&remote_inv, &req.local_root).await?;
            stats.residual_after_verify = Some(residual);
        }

        Ok(SyncResult {
            plan,
            executed,
            stats,
        })
    }

    /// Deletion-only pass: purge remote copies of files that already exist
    /// locally, without transferring anything.
    pub async fn purge(&self, req: &SyncRequest) -> Result<SyncStats, SyncError> {
        let remote_inv = self.remote.fetch().await?;
        let local_inv = self.local.scan(&req.local_root).await?;
        let plan = reconcile(&remote_inv, &local_inv);

        let mut stats = SyncStats::default();
        self.purge_with_plan(&plan, &mut stats).await;
        Ok(stats)
    }

    async fn purge_with_plan(&self, plan: &SyncPlan, stats: &mut SyncStats) {
        for name in &plan.purges {
            if !is_safe_name(name) {
                warn!("skipping purge of unsafe name {name:?}");
                stats.purge_failures += 1;
                continue;
            }
            info!("deleting remote file {name}");
            match self.store.delete(name).await {
                Ok(status) => {
                    info!("delete status: {status}");
                    stats.files_purged += 1;
                }
                Err(e) => {
                    // Non-fatal: the next candidate still gets its chance.
                    warn!("delete of {name} failed: {e}");
                    stats.purge_failures += 1;
                }
            }
        }
    }

    /// Post-download size verification: re-scan and reconcile against the
    /// same remote snapshot. Anything still in the download set is a short
    /// or corrupt write that the next sync pass would pick up.
    async fn verify(
        &self,
        remote_inv: &RemoteInventory,
        root: &Utf8Path,
    ) -> Result<u64, SyncError> {
        let local_inv = self.local.scan(root).await?;
        let residual = reconcile(remote_inv, &local_inv);
        let count = residual.download_count() as u64;
        if count > 0 {
            warn!("{count} files still differ after download; rerun sync");
        }
        Ok(count)
    }
}

fn to_items(names: &[String], remote: &RemoteInventory) -> Vec<TransferItem> {
    names
        .iter()
        .map(|n| TransferItem {
            name: n.clone(),
            expected_size: remote.get(n).map_or(0, |e| e.size),
        })
        .collect()
}
