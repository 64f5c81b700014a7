use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use camino::Utf8PathBuf;
use caravel_infra::remote::{ByteStream, RemoteError, RemoteStore};
use caravel_infra::transfer::{Dispatcher, TransferError, TransferEvent, TransferItem};
use futures::stream;
use tempfile::tempdir;

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory store that tracks how many retrieval streams are alive at once.
/// A stream counts as in flight from `retrieve` until it is dropped.
struct MockStore {
    files: HashMap<String, Vec<u8>>,
    fail: HashSet<String>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockStore {
    fn new(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(n, d)| (n.to_string(), d.to_vec()))
                .collect(),
            fail: HashSet::new(),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing_on(mut self, name: &str) -> Self {
        self.fail.insert(name.to_string());
        self
    }
}

#[async_trait::async_trait]
impl RemoteStore for MockStore {
    async fn list(&self) -> Result<String, RemoteError> {
        Ok(String::new())
    }

    async fn retrieve(&self, name: &str) -> Result<ByteStream, RemoteError> {
        let n = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(n, Ordering::SeqCst);
        let guard = ActiveGuard(self.active.clone());

        let data = self
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| RemoteError::Transfer(format!("no such file {name}")))?;

        let mut chunks: VecDeque<Result<Bytes, RemoteError>> = data
            .chunks(2)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        if self.fail.contains(name) {
            chunks.truncate(1);
            chunks.push_back(Err(RemoteError::Transfer(
                "simulated mid-stream disconnect".to_string(),
            )));
        }

        Ok(Box::pin(stream::unfold(
            (chunks, guard),
            |(mut chunks, guard)| async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                chunks.pop_front().map(|item| (item, (chunks, guard)))
            },
        )))
    }

    async fn delete(&self, name: &str) -> Result<String, RemoteError> {
        Ok(format!("250 {name} deleted"))
    }
}

fn items(names: &[&str]) -> Vec<TransferItem> {
    names
        .iter()
        .map(|n| TransferItem {
            name: n.to_string(),
            expected_size: 0,
        })
        .collect()
}

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

async fn collect_events(
    mut rx: tokio::sync::mpsc::Receiver<TransferEvent>,
) -> Vec<TransferEvent> {
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    events
}

#[tokio::test]
async fn limit_two_never_exceeds_two_in_flight_and_completes_all_five() {
    let store = Arc::new(MockStore::new(&[
        ("f1", b"aaaa"),
        ("f2", b"bbbbbb"),
        ("f3", b"cc"),
        ("f4", b"dddddddd"),
        ("f5", b"e"),
    ]));
    let max_active = store.max_active.clone();
    let dispatcher = Dispatcher::new(store, 2, None);

    let dir = tempdir().unwrap();
    let dest = utf8(dir.path());
    let (tx, rx) = tokio::sync::mpsc::channel(256);

    let stats = dispatcher
        .download_batch(items(&["f1", "f2", "f3", "f4", "f5"]), &dest, Some(tx))
        .await
        .unwrap();

    assert_eq!(stats.files_completed, 5);
    assert!(max_active.load(Ordering::SeqCst) <= 2);

    let events = collect_events(rx).await;
    let mut completed: Vec<String> = events
        .iter()
        .filter_map(|ev| match ev {
            TransferEvent::Completed { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    completed.sort();
    assert_eq!(completed, vec!["f1", "f2", "f3", "f4", "f5"]);

    let expected: [(&str, &[u8]); 5] = [
        ("f1", b"aaaa"),
        ("f2", b"bbbbbb"),
        ("f3", b"cc"),
        ("f4", b"dddddddd"),
        ("f5", b"e"),
    ];
    for (name, data) in expected {
        assert_eq!(std::fs::read(dest.join(name).as_std_path()).unwrap(), data);
    }
}

#[tokio::test]
async fn admission_is_batch_synchronous_not_a_sliding_window() {
    let store = Arc::new(MockStore::new(&[
        ("f1", b"aaaa"),
        ("f2", b"bbbbbbbbbbbb"),
        ("f3", b"cc"),
        ("f4", b"dd"),
        ("f5", b"ee"),
    ]));
    let dispatcher = Dispatcher::new(store, 2, None);

    let dir = tempdir().unwrap();
    let (tx, rx) = tokio::sync::mpsc::channel(256);

    dispatcher
        .download_batch(
            items(&["f1", "f2", "f3", "f4", "f5"]),
            &utf8(dir.path()),
            Some(tx),
        )
        .await
        .unwrap();

    let events = collect_events(rx).await;
    let started_pos = |id: u64| {
        events
            .iter()
            .position(|ev| matches!(ev, TransferEvent::Started { id: i, .. } if *i == id))
            .unwrap()
    };
    let completed_pos = |id: u64| {
        events
            .iter()
            .position(|ev| matches!(ev, TransferEvent::Completed { id: i, .. } if *i == id))
            .unwrap()
    };

    // Files 1-2 must both finish before files 3-4 are admitted, and 3-4
    // before file 5 -- even though f1 is much quicker than f2.
    for earlier in [0u64, 1] {
        for later in [2u64, 3] {
            assert!(completed_pos(earlier) < started_pos(later));
        }
    }
    for earlier in [2u64, 3] {
        assert!(completed_pos(earlier) < started_pos(4));
    }
}

#[tokio::test]
async fn fault_surfaces_after_its_batch_and_abandons_the_rest() {
    let store = Arc::new(
        MockStore::new(&[
            ("f1", b"aaaa"),
            ("f2", b"bbbbbb"),
            ("f3", b"cc"),
            ("f4", b"dd"),
            ("f5", b"ee"),
        ])
        .failing_on("f2"),
    );
    let dispatcher = Dispatcher::new(store, 2, None);

    let dir = tempdir().unwrap();
    let dest = utf8(dir.path());
    let (tx, rx) = tokio::sync::mpsc::channel(256);

    let err = dispatcher
        .download_batch(items(&["f1", "f2", "f3", "f4", "f5"]), &dest, Some(tx))
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Remote(_)));

    // The healthy member of the faulting batch still lands in full.
    assert_eq!(
        std::fs::read(dest.join("f1").as_std_path()).unwrap(),
        b"aaaa"
    );
    // No cleanup: the half-written destination file stays on disk.
    assert_eq!(std::fs::read(dest.join("f2").as_std_path()).unwrap(), b"bb");

    // Nothing past the faulting batch was admitted.
    let events = collect_events(rx).await;
    for ev in &events {
        if let TransferEvent::Started { name, .. } = ev {
            assert!(name == "f1" || name == "f2", "unexpected admission {name}");
        }
    }
    assert!(!dest.join("f3").as_std_path().exists());
}

#[tokio::test]
async fn destination_directory_is_created_when_absent() {
    let store = Arc::new(MockStore::new(&[("f1", b"abc")]));
    let dispatcher = Dispatcher::new(store, 4, None);

    let dir = tempdir().unwrap();
    let dest = utf8(dir.path()).join("nested").join("mirror");

    let stats = dispatcher
        .download_batch(items(&["f1"]), &dest, None)
        .await
        .unwrap();
    assert_eq!(stats.files_completed, 1);
    assert_eq!(stats.bytes_downloaded, 3);
    assert!(dest.join("f1").as_std_path().exists());
}

#[tokio::test]
async fn unsafe_listing_names_are_rejected() {
    let store = Arc::new(MockStore::new(&[]));
    let dispatcher = Dispatcher::new(store, 4, None);

    let dir = tempdir().unwrap();
    let err = dispatcher
        .download_batch(items(&["../evil"]), &utf8(dir.path()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::UnsafeName(_)));
}
