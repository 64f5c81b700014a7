use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use camino::Utf8Path;
use caravel_core::names::is_safe_name;
use futures::StreamExt;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::remote::{RemoteError, RemoteStore};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;
type InFlight = HashMap<u64, (JoinHandle<Result<u64, TransferError>>, String)>;

/// One file the dispatcher should fetch.
#[derive(Debug, Clone)]
pub struct TransferItem {
    pub name: String,
    /// Size reported by the listing; informational, drives progress totals.
    /// Zero when the listing's size field did not parse.
    pub expected_size: u64,
}

#[derive(Debug)]
pub enum TransferEvent {
    Started {
        id: u64,
        name: String,
        expected_size: u64,
    },
    Progress {
        id: u64,
        bytes_delta: u64,
    },
    Completed {
        id: u64,
        name: String,
        bytes_downloaded: u64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    pub files_completed: u64,
    pub bytes_downloaded: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("unsafe filename from listing: {0:?}")]
    UnsafeName(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("transfer task failed: {0}")]
    Join(String),
}

/// Executes a download plan against a [`RemoteStore`] under a concurrency
/// cap.
///
/// The limiter is batch-synchronous: items are admitted in order, and once
/// the in-flight registry holds `concurrency` operations the dispatcher
/// drains *every* one of them before admitting more. A batch therefore runs
/// at the pace of its slowest member; this is the load-shaping mechanism of
/// the whole sync, kept deliberately instead of a sliding window.
pub struct Dispatcher {
    store: Arc<dyn RemoteStore>,
    concurrency: usize,
    rate_limit_bytes: Option<u64>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        concurrency: usize,
        rate_limit_bytes: Option<u64>,
    ) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            rate_limit_bytes,
        }
    }

    /// Fetch every item into `dest`, creating the directory if needed.
    ///
    /// Faults surface after the faulting batch has drained (the batch is
    /// never abandoned mid-wait); items not yet admitted are dropped, no
    /// retry is attempted, and a half-written destination file stays on
    /// disk. Progress notices are emitted per file over `progress_tx`.
    pub async fn download_batch(
        &self,
        items: Vec<TransferItem>,
        dest: &Utf8Path,
        progress_tx: Option<Sender<TransferEvent>>,
    ) -> Result<TransferStats, TransferError> {
        tokio::fs::create_dir_all(dest.as_std_path()).await?;

        let limiter = self.rate_limit_bytes.and_then(|bps| {
            NonZeroU32::new(bps as u32)
                .map(|nz| Arc::new(RateLimiter::direct(Quota::per_second(nz))))
        });

        let mut stats = TransferStats::default();
        let mut in_flight: InFlight = HashMap::new();

        for (i, item) in items.into_iter().enumerate() {
            if !is_safe_name(&item.name) {
                drain(&mut in_flight, &mut stats).await?;
                return Err(TransferError::UnsafeName(item.name));
            }

            let id = i as u64;
            let store = self.store.clone();
            let dest = dest.to_owned();
            let tx = progress_tx.clone();
            let lim = limiter.clone();
            let name = item.name.clone();

            info!("download started {name}");
            let handle =
                tokio::spawn(async move { transfer_one(store, item, id, &dest, tx, lim).await });
            in_flight.insert(id, (handle, name));

            if in_flight.len() >= self.concurrency {
                drain(&mut in_flight, &mut stats).await?;
            }
        }

        drain(&mut in_flight, &mut stats).await?;
        Ok(stats)
    }
}

/// Wait for every in-flight operation, emptying the registry, then surface
/// the first fault of the batch.
async fn drain(in_flight: &mut InFlight, stats: &mut TransferStats) -> Result<(), TransferError> {
    let mut first_fault = None;
    for (_, (handle, name)) in in_flight.drain() {
        match handle.await {
            Ok(Ok(bytes)) => {
                stats.files_completed += 1;
                stats.bytes_downloaded += bytes;
            }
            Ok(Err(e)) => {
                warn!("download failed {name}: {e}");
                if first_fault.is_none() {
                    first_fault = Some(e);
                }
            }
            Err(e) => {
                if first_fault.is_none() {
                    first_fault = Some(TransferError::Join(e.to_string()));
                }
            }
        }
    }
    match first_fault {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Copy one remote file to `dest/name` in fixed-size chunks.
///
/// The destination is created or truncated, never appended: a rerun always
/// restarts at offset 0. No checksum or size verification happens here;
/// that belongs to the next reconciliation pass.
async fn transfer_one(
    store: Arc<dyn RemoteStore>,
    item: TransferItem,
    id: u64,
    dest: &Utf8Path,
    tx: Option<Sender<TransferEvent>>,
    limiter: Option<Arc<DirectLimiter>>,
) -> Result<u64, TransferError> {
    if let Some(ref t) = tx {
        let _ = t
            .send(TransferEvent::Started {
                id,
                name: item.name.clone(),
                expected_size: item.expected_size,
            })
            .await;
    }

    let target = dest.join(&item.name);
    let mut stream = store.retrieve(&item.name).await?;
    let mut file = tokio::fs::File::create(target.as_std_path()).await?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(l) = &limiter {
            if let Some(nz) = NonZeroU32::new(chunk.len() as u32) {
                l.until_n_ready(nz).await.ok();
            }
        }
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        if let Some(ref t) = tx {
            let _ = t
                .send(TransferEvent::Progress {
                    id,
                    bytes_delta: chunk.len() as u64,
                })
                .await;
        }
    }
    file.flush().await?;

    info!("download finished {}", item.name);
    if let Some(ref t) = tx {
        let _ = t
            .send(TransferEvent::Completed {
                id,
                name: item.name.clone(),
                bytes_downloaded: written,
            })
            .await;
    }
    Ok(written)
}
