use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod diff;
pub mod listing;
pub mod names;

/// One file as reported by the remote directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub size: u64,
    /// False when the listing's size field failed to parse as an integer.
    /// The entry still takes part in reconciliation with `size == 0`.
    pub size_valid: bool,
}

/// Server-reported name -> entry. Rebuilt from scratch on every listing fetch.
pub type RemoteInventory = HashMap<String, RemoteEntry>;

/// Bare file name -> byte length on disk. Rebuilt on every scan.
pub type LocalInventory = HashMap<String, u64>;

/// Outcome of one reconciliation pass over a single snapshot of both
/// inventories. Consumed once and discarded.
///
/// `missing` and `mismatched` together form the download set; they stay
/// separate because the dispatcher runs once per category. `purges` holds the
/// remote entries already safely replicated locally. A name never appears in
/// both the download set and `purges`. Each list is sorted so downstream
/// admission order is reproducible.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    /// Remote entries with no local counterpart.
    pub missing: Vec<String>,
    /// Present locally but with a different byte length.
    pub mismatched: Vec<String>,
    /// Present locally with a matching byte length; safe to delete remotely.
    pub purges: Vec<String>,
}

impl SyncPlan {
    pub fn download_count(&self) -> usize {
        self.missing.len() + self.mismatched.len()
    }

    /// Iterate the download set, missing first.
    pub fn downloads(&self) -> impl Iterator<Item = &String> {
        self.missing.iter().chain(self.mismatched.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty() && self.purges.is_empty()
    }
}
