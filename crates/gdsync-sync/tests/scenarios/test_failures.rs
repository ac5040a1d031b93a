//! Degraded behavior on remote failures and fatal preconditions

use gdsync_sync::{RetryError, SyncError};

use crate::common::{Call, FakeRemoteStore, Harness, Op, ROOT_ID};

fn upload_calls(calls: &[Call], name: &str) -> usize {
    calls
        .iter()
        .filter(|c| matches!(c, Call::CreateFile { name: n, .. } if n == name))
        .count()
}

#[tokio::test]
async fn test_upload_gives_up_after_ten_server_error_retries() {
    let h = Harness::new();
    h.write("a.txt", 100);
    h.write("b.txt", 20);
    h.store.fail_named(Op::CreateFile, "a.txt", &[500; 11]);

    let report = h.engine().sync().await.unwrap();

    let calls = h.store.calls();
    assert_eq!(upload_calls(&calls, "a.txt"), 11);
    assert_eq!(report.upload_failures, 1);
    assert_eq!(report.files_uploaded, 1);
    assert!(h.store.children_named(ROOT_ID, "a.txt").is_empty());
    assert!(!h.cache.get(&h.root().join("a.txt")).ok);
    assert!(h.cache.get(&h.root().join("b.txt")).ok);

    // The duplicate check runs before every retry
    let named_listings = calls
        .iter()
        .filter(|c| matches!(c, Call::List { name: Some(n), .. } if n == "a.txt"))
        .count();
    assert_eq!(named_listings, 10);
}

#[tokio::test]
async fn test_upload_recovers_from_transient_errors() {
    let h = Harness::new();
    h.write("a.txt", 100);
    h.store.fail_named(Op::CreateFile, "a.txt", &[503, 429, 500]);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(upload_calls(&h.store.calls(), "a.txt"), 4);
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.upload_failures, 0);
    assert_eq!(h.store.children_named(ROOT_ID, "a.txt").len(), 1);
}

#[tokio::test]
async fn test_partial_upload_is_removed_before_retry() {
    let h = Harness::new();
    h.write("a.txt", 100);
    h.store.fail_upload_after_create("a.txt", &[503]);

    let report = h.engine().sync().await.unwrap();

    let remaining = h.store.children_named(ROOT_ID, "a.txt");
    assert_eq!(remaining.len(), 1);
    assert_eq!(report.objects_deleted, 1);
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(
        h.cache.get(&h.root().join("a.txt")).remote_object().unwrap().id,
        remaining[0].id
    );
}

#[tokio::test]
async fn test_client_error_upload_is_not_retried() {
    let h = Harness::new();
    h.write("a.txt", 100);
    h.store.fail_named(Op::CreateFile, "a.txt", &[403]);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(upload_calls(&h.store.calls(), "a.txt"), 1);
    assert_eq!(report.upload_failures, 1);
}

#[tokio::test]
async fn test_failed_folder_skips_subtree() {
    let h = Harness::new();
    h.write("other.txt", 5);
    h.write("sub/b.txt", 50);
    h.store.fail_named(Op::CreateFolder, "sub", &[403]);

    let report = h.engine().sync().await.unwrap();

    let calls = h.store.calls();
    assert_eq!(upload_calls(&calls, "other.txt"), 1);
    assert_eq!(upload_calls(&calls, "b.txt"), 0);
    assert_eq!(report.folders_created, 0);
    assert_eq!(report.files_uploaded, 1);

    let entry = h.cache.get(&h.root().join("sub"));
    assert!(!entry.ok);
    assert_eq!(entry.http_status, Some(403));
    assert!(entry.error.unwrap().contains("403"));
}

#[tokio::test]
async fn test_listing_failure_degrades_to_upload() {
    let h = Harness::new();
    h.store.add_file(ROOT_ID, "a.txt", 100);
    h.write("a.txt", 100);
    h.store.fail(Op::List, &[404]);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.files_skipped, 0);
    assert_eq!(h.store.children_named(ROOT_ID, "a.txt").len(), 2);
}

#[tokio::test]
async fn test_failed_second_listing_page_keeps_first_page() {
    let h = Harness::with_store(FakeRemoteStore::new().with_page_size(3));
    // Listed in this order; the later "a.txt" wins
    h.store.add_file(ROOT_ID, "a.txt", 3);
    h.store.add_file(ROOT_ID, "a.txt", 10);
    h.store.add_file(ROOT_ID, "b.txt", 10);
    h.store.add_file(ROOT_ID, "c.txt", 10);
    h.store.add_file(ROOT_ID, "d.txt", 10);
    for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
        h.write(name, 10);
    }
    h.store.fail_page("3", &[403]);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(report.files_skipped, 2);
    assert_eq!(report.files_uploaded, 2);
    assert_eq!(report.objects_deleted, 0);

    let calls = h.store.calls();
    assert_eq!(upload_calls(&calls, "a.txt"), 0);
    assert_eq!(upload_calls(&calls, "b.txt"), 0);
    assert_eq!(upload_calls(&calls, "c.txt"), 1);
    assert_eq!(upload_calls(&calls, "d.txt"), 1);
    let listings = calls
        .iter()
        .filter(|c| matches!(c, Call::List { name: None, .. }))
        .count();
    assert_eq!(listings, 2);
}

#[tokio::test]
async fn test_failed_delete_still_uploads() {
    let h = Harness::new();
    h.store.add_file(ROOT_ID, "a.txt", 10);
    h.write("a.txt", 100);
    h.store.fail(Op::Delete, &[403]);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(report.objects_deleted, 0);
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(h.store.children_named(ROOT_ID, "a.txt").len(), 2);
}

#[tokio::test]
async fn test_remote_root_lookup_is_retried() {
    let h = Harness::new();
    h.write("a.txt", 1);
    h.store.fail(Op::Get, &[429, 503]);

    let report = h.engine().sync().await.unwrap();

    let gets = h
        .store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Get(_)))
        .count();
    assert_eq!(gets, 3);
    assert_eq!(report.files_uploaded, 1);
}

#[tokio::test]
async fn test_missing_local_root_is_fatal() {
    let h = Harness::new();
    std::fs::remove_dir(h.root()).unwrap();

    let err = h.engine().sync().await.unwrap_err();

    assert!(matches!(err, SyncError::LocalRootMissing(_)));
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn test_local_root_that_is_a_file_is_fatal() {
    let h = Harness::new();
    std::fs::remove_dir(h.root()).unwrap();
    std::fs::write(h.root(), b"not a directory").unwrap();

    let err = h.engine().sync().await.unwrap_err();
    assert!(matches!(err, SyncError::LocalRootMissing(_)));
}

#[tokio::test]
async fn test_remote_root_that_is_a_file_is_fatal() {
    let h = Harness::new();
    let file = h.store.add_file(ROOT_ID, "notes.txt", 4);
    h.write("a.txt", 1);

    let err = h.engine_for(file.id.as_str()).sync().await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteRootNotFolder { .. }));
    assert!(h.store.mutations().is_empty());
}

#[tokio::test]
async fn test_unknown_remote_root_is_fatal() {
    let h = Harness::new();
    h.write("a.txt", 1);

    let err = h.engine_for("missing").sync().await.unwrap_err();

    match err {
        SyncError::RemoteRoot(RetryError::Permanent { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.store.mutations().is_empty());
}
