use caravel_core::diff::reconcile;
use caravel_core::{LocalInventory, RemoteEntry, RemoteInventory};

fn remote(entries: &[(&str, u64, bool)]) -> RemoteInventory {
    entries
        .iter()
        .map(|&(name, size, size_valid)| (name.to_string(), RemoteEntry { size, size_valid }))
        .collect()
}

fn local(entries: &[(&str, u64)]) -> LocalInventory {
    entries
        .iter()
        .map(|&(name, size)| (name.to_string(), size))
        .collect()
}

#[test]
fn remote_only_entry_is_missing() {
    let plan = reconcile(&remote(&[("a", 10, true)]), &local(&[]));
    assert_eq!(plan.missing, vec!["a"]);
    assert!(plan.mismatched.is_empty());
    assert!(plan.purges.is_empty());
}

#[test]
fn matching_sizes_produce_no_downloads() {
    let plan = reconcile(&remote(&[("a", 10, true)]), &local(&[("a", 10)]));
    assert_eq!(plan.download_count(), 0);
    assert_eq!(plan.purges, vec!["a"]);
}

#[test]
fn size_mismatch_is_redownloaded() {
    let plan = reconcile(&remote(&[("a", 10, true)]), &local(&[("a", 5)]));
    assert_eq!(plan.mismatched, vec!["a"]);
    assert!(plan.missing.is_empty());
}

#[test]
fn empty_remote_yields_empty_plan() {
    let plan = reconcile(&remote(&[]), &local(&[("a", 1), ("b", 2)]));
    assert!(plan.is_empty());
}

#[test]
fn invalid_size_entry_still_downloads_when_missing() {
    let plan = reconcile(&remote(&[("blob", 0, false)]), &local(&[]));
    assert_eq!(plan.missing, vec!["blob"]);
}

#[test]
fn invalid_size_compares_as_zero_against_local() {
    // The unparsed size is carried as zero, so any non-empty local copy
    // counts as mismatched; an empty one counts as replicated.
    let plan = reconcile(&remote(&[("blob", 0, false)]), &local(&[("blob", 7)]));
    assert_eq!(plan.mismatched, vec!["blob"]);

    let plan = reconcile(&remote(&[("blob", 0, false)]), &local(&[("blob", 0)]));
    assert_eq!(plan.purges, vec!["blob"]);
}

#[test]
fn purges_never_name_files_absent_locally() {
    let plan = reconcile(
        &remote(&[("kept", 3, true), ("gone", 4, true)]),
        &local(&[("kept", 3)]),
    );
    assert_eq!(plan.purges, vec!["kept"]);
    assert_eq!(plan.missing, vec!["gone"]);
}

#[test]
fn download_set_and_purge_set_are_disjoint() {
    let plan = reconcile(
        &remote(&[("same", 1, true), ("diff", 2, true), ("new", 3, true)]),
        &local(&[("same", 1), ("diff", 9)]),
    );
    for name in plan.downloads() {
        assert!(!plan.purges.contains(name));
    }
    assert_eq!(plan.purges, vec!["same"]);
}

#[test]
fn reconciliation_is_idempotent_on_unchanged_inventories() {
    let r = remote(&[("a", 10, true), ("b", 20, true), ("c", 30, true)]);
    let l = local(&[("a", 10), ("b", 5)]);

    let first = reconcile(&r, &l);
    let second = reconcile(&r, &l);
    assert_eq!(first.missing, second.missing);
    assert_eq!(first.mismatched, second.mismatched);
    assert_eq!(first.purges, second.purges);
}

#[test]
fn plan_empties_once_downloads_land_locally() {
    let r = remote(&[("a", 10, true), ("b", 20, true)]);
    let l = local(&[("a", 3)]);

    let first = reconcile(&r, &l);
    assert_eq!(first.download_count(), 2);

    // Simulate the downloads completing at their remote sizes.
    let mut updated = l.clone();
    for name in first.downloads() {
        updated.insert(name.clone(), r[name].size);
    }

    let second = reconcile(&r, &updated);
    assert_eq!(second.download_count(), 0);
    assert_eq!(second.purges, vec!["a", "b"]);
}

#[test]
fn plan_lists_are_sorted_for_stable_admission_order() {
    let plan = reconcile(
        &remote(&[("zeta", 1, true), ("alpha", 1, true), ("mid", 1, true)]),
        &local(&[]),
    );
    assert_eq!(plan.missing, vec!["alpha", "mid", "zeta"]);
}
