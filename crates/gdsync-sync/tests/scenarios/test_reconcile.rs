//! Reconciliation of a local tree against remote state

use std::sync::Arc;

use gdsync_core::domain::ObjectKind;
use gdsync_sync::state::SyncStateCache;

use crate::common::{Call, FakeRemoteStore, Harness, ROOT_ID};

#[tokio::test]
async fn test_empty_remote_receives_whole_tree() {
    let h = Harness::new();
    h.write("a.txt", 100);
    h.write("sub/b.txt", 50);

    let report = h.engine().sync().await.unwrap();

    let sub = h.store.children_named(ROOT_ID, "sub");
    assert_eq!(sub.len(), 1);
    let sub_id = sub[0].id.to_string();

    let mutations = h.store.mutations();
    assert_eq!(mutations.len(), 3, "{mutations:?}");
    let mkdir = Call::CreateFolder {
        name: "sub".to_string(),
        parent: ROOT_ID.to_string(),
    };
    let upload_a = Call::CreateFile {
        name: "a.txt".to_string(),
        parent: ROOT_ID.to_string(),
        size: 100,
    };
    let upload_b = Call::CreateFile {
        name: "b.txt".to_string(),
        parent: sub_id.clone(),
        size: 50,
    };
    assert!(mutations.contains(&mkdir));
    assert!(mutations.contains(&upload_a));
    assert!(mutations.contains(&upload_b));

    let pos = |call: &Call| mutations.iter().position(|c| c == call).unwrap();
    assert!(pos(&mkdir) < pos(&upload_b));

    assert_eq!(report.files_uploaded, 2);
    assert_eq!(report.folders_created, 1);
    assert_eq!(report.files_skipped, 0);
    assert_eq!(report.objects_deleted, 0);
    assert_eq!(report.bytes_considered, 150);

    for path in ["a.txt", "sub", "sub/b.txt"] {
        let entry = h.cache.get(&h.root().join(path));
        assert!(entry.ok, "{path} not recorded");
    }
    let b = h.cache.get(&h.root().join("sub/b.txt"));
    assert_eq!(b.remote_object().unwrap().parent_ids[0].as_str(), sub_id);
}

#[tokio::test]
async fn test_matching_file_is_not_touched() {
    let h = Harness::new();
    h.store.add_file(ROOT_ID, "a.txt", 100);
    h.write("a.txt", 100);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(
        h.store.calls(),
        vec![
            Call::Get(ROOT_ID.to_string()),
            Call::List {
                parent: ROOT_ID.to_string(),
                name: None
            },
        ]
    );
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.bytes_considered, 100);
    assert!(h.cache.get(&h.root().join("a.txt")).ok);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let h = Harness::new();
    h.write("a.txt", 100);
    h.write("sub/b.txt", 50);
    h.write("sub/deeper/c.txt", 10);

    h.engine().sync().await.unwrap();
    h.store.clear_calls();

    let report = h.engine().sync().await.unwrap();

    assert_eq!(h.store.calls(), vec![Call::Get(ROOT_ID.to_string())]);
    assert_eq!(report.remote_changes(), 0);
    assert_eq!(report.files_skipped, 3);
    assert_eq!(report.bytes_considered, 160);
}

#[tokio::test]
async fn test_persisted_cache_avoids_listings_after_restart() {
    let h = Harness::new();
    h.write("a.txt", 100);
    h.write("sub/b.txt", 50);

    h.engine().sync().await.unwrap();
    h.cache.save().await.unwrap();
    h.store.clear_calls();

    let reloaded = SyncStateCache::load(h.cache.state_file(), h.root())
        .await
        .unwrap();
    assert_eq!(reloaded.entries(), h.cache.entries());

    let report = h
        .engine_with_cache(Arc::new(reloaded))
        .sync()
        .await
        .unwrap();

    assert_eq!(h.store.calls(), vec![Call::Get(ROOT_ID.to_string())]);
    assert_eq!(report.remote_changes(), 0);
}

#[tokio::test]
async fn test_size_mismatch_replaces_remote_file() {
    let h = Harness::new();
    let stale = h.store.add_file(ROOT_ID, "a.txt", 10);
    h.write("a.txt", 100);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(
        h.store.mutations(),
        vec![
            Call::Delete(stale.id.to_string()),
            Call::CreateFile {
                name: "a.txt".to_string(),
                parent: ROOT_ID.to_string(),
                size: 100,
            },
        ]
    );
    let remaining = h.store.children_named(ROOT_ID, "a.txt");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].size, Some(100));
    assert_eq!(report.objects_deleted, 1);
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(
        h.cache.get(&h.root().join("a.txt")).remote_object().unwrap().id,
        remaining[0].id
    );
}

#[tokio::test]
async fn test_remote_folder_in_place_of_file_is_replaced() {
    let h = Harness::new();
    let folder = h.store.add_folder(ROOT_ID, "a.txt");
    h.write("a.txt", 100);

    h.engine().sync().await.unwrap();

    let mutations = h.store.mutations();
    assert_eq!(mutations[0], Call::Delete(folder.id.to_string()));
    let remaining = h.store.children_named(ROOT_ID, "a.txt");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].kind, ObjectKind::File);
}

#[tokio::test]
async fn test_remote_file_in_place_of_folder_is_replaced() {
    let h = Harness::new();
    let file = h.store.add_file(ROOT_ID, "sub", 3);
    h.write("sub/c.txt", 5);

    let report = h.engine().sync().await.unwrap();

    let mutations = h.store.mutations();
    let delete = Call::Delete(file.id.to_string());
    let mkdir = Call::CreateFolder {
        name: "sub".to_string(),
        parent: ROOT_ID.to_string(),
    };
    assert_eq!(&mutations[..2], &[delete, mkdir]);

    let sub = h.store.children_named(ROOT_ID, "sub");
    assert_eq!(sub.len(), 1);
    assert!(sub[0].is_folder());
    assert_eq!(h.store.children_named(sub[0].id.as_str(), "c.txt").len(), 1);
    assert_eq!(report.objects_deleted, 1);
    assert_eq!(report.folders_created, 1);
}

#[tokio::test]
async fn test_existing_folder_is_reused() {
    let h = Harness::new();
    let sub = h.store.add_folder(ROOT_ID, "sub");
    h.store.add_file(sub.id.as_str(), "b.txt", 50);
    h.write("sub/b.txt", 50);

    let report = h.engine().sync().await.unwrap();

    assert!(h.store.mutations().is_empty());
    assert_eq!(report.files_skipped, 1);
    assert_eq!(
        h.cache.get(&h.root().join("sub")).remote_object().unwrap().id,
        sub.id
    );
}

/// Seeds the same remote state and local tree in a fresh harness
fn seeded_harness() -> Harness {
    let h = Harness::new();
    h.store.add_file(ROOT_ID, "a.txt", 100);
    h.store.add_file(ROOT_ID, "b.txt", 20);
    h.write("a.txt", 100);
    h.write("b.txt", 30);
    h.write("c.txt", 7);
    h
}

#[tokio::test]
async fn test_incomplete_cache_falls_back_to_listing() {
    let warm = seeded_harness();
    let a = warm.store.children_named(ROOT_ID, "a.txt").remove(0);
    warm.cache.set_success(&warm.root().join("a.txt"), a).unwrap();

    let cold = seeded_harness();

    let warm_report = warm.engine().sync().await.unwrap();
    let cold_report = cold.engine().sync().await.unwrap();

    assert!(warm.store.calls().contains(&Call::List {
        parent: ROOT_ID.to_string(),
        name: None,
    }));
    assert_eq!(warm.store.tree(ROOT_ID), cold.store.tree(ROOT_ID));
    assert_eq!(warm_report.files_uploaded, cold_report.files_uploaded);
    assert_eq!(warm_report.objects_deleted, cold_report.objects_deleted);
    assert_eq!(warm_report.files_uploaded, 2);
    assert_eq!(warm_report.files_skipped, 1);
}

#[tokio::test]
async fn test_cache_entry_under_other_parent_is_ignored() {
    let h = Harness::new();
    let elsewhere = h.store.add_folder(ROOT_ID, "elsewhere");
    let foreign = h.store.add_file(elsewhere.id.as_str(), "a.txt", 100);
    h.cache.set_success(&h.root().join("a.txt"), foreign).unwrap();
    h.write("a.txt", 100);

    let report = h.engine().sync().await.unwrap();

    assert_eq!(report.files_uploaded, 1);
    assert_eq!(h.store.children_named(ROOT_ID, "a.txt").len(), 1);
}

#[tokio::test]
async fn test_listing_follows_pages() {
    let h = Harness::with_store(FakeRemoteStore::new().with_page_size(2));
    for i in 0..5 {
        let name = format!("f{i}.txt");
        h.store.add_file(ROOT_ID, &name, 10);
        h.write(&name, 10);
    }

    let report = h.engine().sync().await.unwrap();

    let listings = h
        .store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::List { .. }))
        .count();
    assert_eq!(listings, 3);
    assert!(h.store.mutations().is_empty());
    assert_eq!(report.files_skipped, 5);
}

#[tokio::test]
async fn test_listing_backfills_cache() {
    let h = Harness::new();
    h.store.add_file(ROOT_ID, "a.txt", 100);
    h.store.add_file(ROOT_ID, "remote-only.txt", 1);
    h.write("a.txt", 100);

    h.engine().sync().await.unwrap();

    let entries = h.cache.entries();
    assert!(entries["a.txt"].ok);
    assert!(entries["remote-only.txt"].ok);
    assert!(entries[""].ok);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinks_are_not_mirrored() {
    let h = Harness::new();
    h.write("a.txt", 10);
    std::os::unix::fs::symlink(h.root().join("a.txt"), h.root().join("link.txt")).unwrap();

    let report = h.engine().sync().await.unwrap();

    assert_eq!(report.files_uploaded, 1);
    assert!(h.store.children_named(ROOT_ID, "link.txt").is_empty());
}
