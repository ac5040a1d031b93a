//! Upload concurrency ceiling

use std::time::Duration;

use crate::common::{FakeRemoteStore, Harness, ROOT_ID};

fn slow_harness(max_concurrency: usize, files: usize) -> Harness {
    let store = FakeRemoteStore::new().with_upload_delay(Duration::from_millis(20));
    let mut h = Harness::with_store(store);
    h.max_concurrency = max_concurrency;
    for i in 0..files {
        h.write(&format!("dir{}/f{i}.bin", i % 3), 10 + i);
    }
    h
}

#[tokio::test]
async fn test_uploads_never_exceed_ceiling() {
    let h = slow_harness(3, 12);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(report.files_uploaded, 12);
    let peak = h.store.peak_in_flight();
    assert!(peak <= 3, "peak in-flight uploads was {peak}");
    assert!(peak >= 2, "uploads never overlapped (peak {peak})");
}

#[tokio::test]
async fn test_ceiling_of_one_serializes_uploads() {
    let h = slow_harness(1, 5);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(report.files_uploaded, 5);
    assert_eq!(h.store.peak_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ceiling_holds_on_multi_threaded_runtime() {
    let h = slow_harness(2, 10);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(report.files_uploaded, 10);
    assert!(h.store.peak_in_flight() <= 2);
    assert_eq!(h.store.children(ROOT_ID).len(), 3);
}

#[tokio::test]
async fn test_progress_counts_every_file() {
    let h = slow_harness(4, 6);
    h.store.add_folder(ROOT_ID, "unrelated");

    let report = h.engine().sync().await.unwrap();

    // sizes are 10..=15
    assert_eq!(report.bytes_considered, (10..16).sum::<u64>());
}

#[tokio::test]
async fn test_dropped_run_makes_no_further_remote_changes() {
    let store = FakeRemoteStore::new().with_folder_delay(Duration::from_millis(10));
    let h = Harness::with_store(store);
    for i in 0..20 {
        h.write(&format!("d{i:02}/f.bin"), 1);
    }

    let engine = h.engine();
    let outcome = tokio::time::timeout(Duration::from_millis(60), engine.sync()).await;
    assert!(outcome.is_err(), "run finished before the deadline");

    let at_drop = h.store.mutations().len();
    assert!(at_drop < 40, "every folder and file was already mirrored");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.store.mutations().len(), at_drop);
}
