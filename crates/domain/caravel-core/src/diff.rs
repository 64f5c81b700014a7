use crate::{LocalInventory, RemoteInventory, SyncPlan};

/// Diff one consistent snapshot of the remote and local inventories into a
/// transfer/cleanup plan. Purely functional; no side effects.
///
/// A remote entry missing locally is downloaded; one present with a
/// different byte length is re-downloaded; one present with a matching
/// length is a purge candidate. The remote size takes part in the
/// comparison even when the listing failed to parse it (it compares as
/// zero) — see DESIGN.md. Size-mismatched names are excluded from the purge
/// set so no name is ever both fetched and deleted in the same pass.
pub fn reconcile(remote: &RemoteInventory, local: &LocalInventory) -> SyncPlan {
    let mut missing = Vec::new();
    let mut mismatched = Vec::new();
    let mut purges = Vec::new();

    for (name, entry) in remote {
        match local.get(name) {
            None => missing.push(name.clone()),
            Some(&local_size) if entry.size != local_size => mismatched.push(name.clone()),
            Some(_) => purges.push(name.clone()),
        }
    }

    missing.sort();
    mismatched.sort();
    purges.sort();

    SyncPlan {
        missing,
        mismatched,
        purges,
    }
}
