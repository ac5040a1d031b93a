//! Remote operations used during a sync run
//!
//! Each operation drives the remote store through the retry executor and
//! degrades failures: a failed upload, folder creation or deletion is
//! logged and reported as `None`/`false`, never as an error, so a single
//! item cannot abort the tree walk.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use gdsync_core::domain::{RemoteId, RemoteObject};
use gdsync_core::ports::{IRemoteStore, ListQuery};

use crate::planner::UploadTask;
use crate::progress::{Progress, RunStats};
use crate::retry::{retry, retry_with_hook, RetryError, RetryPolicy};
use crate::state::SyncStateCache;

/// Remote operations bound to the shared state of one sync run
pub struct SyncOps {
    store: Arc<dyn IRemoteStore>,
    policy: RetryPolicy,
    cache: Arc<SyncStateCache>,
    progress: Arc<Progress>,
    stats: Arc<RunStats>,
}

impl SyncOps {
    pub fn new(
        store: Arc<dyn IRemoteStore>,
        policy: RetryPolicy,
        cache: Arc<SyncStateCache>,
        progress: Arc<Progress>,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            store,
            policy,
            cache,
            progress,
            stats,
        }
    }

    /// Fetches one object, retrying transient failures
    pub async fn get_by_id(&self, id: &RemoteId) -> Result<RemoteObject, RetryError> {
        retry(&self.policy, "get", || self.store.get_by_id(id)).await
    }

    /// All non-trashed children of `parent`, keyed by name
    ///
    /// Pages are fetched in order; on duplicate names the last one wins.
    /// A failing page ends the listing: the error is logged and whatever
    /// was collected so far is returned.
    pub async fn list_children(&self, parent: &RemoteObject) -> BTreeMap<String, RemoteObject> {
        let mut children = BTreeMap::new();
        let mut page_token = None;

        loop {
            let query = ListQuery::children().with_page_token(page_token.take());
            match retry(&self.policy, "list", || self.store.list_page(&parent.id, &query)).await {
                Ok(page) => {
                    for object in page.objects {
                        children.insert(object.name.clone(), object);
                    }
                    match page.next_page_token {
                        Some(token) => page_token = Some(token),
                        None => break,
                    }
                }
                Err(e) => {
                    error!(
                        parent = %parent.id,
                        name = %parent.name,
                        error = %e,
                        "Listing failed, treating the missing children as absent"
                    );
                    break;
                }
            }
        }

        debug!(parent = %parent.id, count = children.len(), "Listed remote children");
        children
    }

    /// Every child of `parent` named exactly `name`
    async fn find_named(&self, parent: &RemoteId, name: &str) -> anyhow::Result<Vec<RemoteObject>> {
        let mut found = Vec::new();
        let mut page_token = None;

        loop {
            let query = ListQuery::named(name).with_page_token(page_token.take());
            let page = retry(&self.policy, "list", || self.store.list_page(parent, &query)).await?;
            found.extend(page.objects.into_iter().filter(|o| o.name == name));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(found),
            }
        }
    }

    /// Deletes every child of `parent` named `name`
    ///
    /// Runs before an upload is retried: a failed create may still have
    /// produced an object, and the retry must not leave a duplicate.
    pub async fn purge_named(&self, parent: &RemoteId, name: &str) -> anyhow::Result<()> {
        let duplicates = self
            .find_named(parent, name)
            .await
            .with_context(|| format!("listing '{name}' before retry"))?;

        for duplicate in duplicates {
            info!(id = %duplicate.id, name, "Removing partial upload before retry");
            retry(&self.policy, "delete", || self.store.delete(&duplicate.id))
                .await
                .with_context(|| format!("deleting duplicate {}", duplicate.id))?;
            self.stats.object_deleted();
        }
        Ok(())
    }

    /// Uploads one file and records the result
    ///
    /// Returns the created object, or `None` when the upload failed. The
    /// file is then left unsynced for the next run.
    pub async fn upload_file(&self, task: &UploadTask) -> Option<RemoteObject> {
        let result = retry_with_hook(
            &self.policy,
            "upload",
            || self.store.create_file(&task.name, &task.parent.id, &task.local_path),
            Some(|| self.purge_named(&task.parent.id, &task.name)),
        )
        .await;

        match result {
            Ok(created) => {
                if let Err(e) = self.cache.set_success(&task.local_path, created.clone()) {
                    warn!(path = %task.local_path.display(), error = %e, "Cannot record upload");
                }
                self.progress.add(created.size.unwrap_or(task.size));
                self.stats.file_uploaded();
                info!(
                    path = %task.local_path.display(),
                    id = %created.id,
                    size = task.size,
                    "Uploaded"
                );
                Some(created)
            }
            Err(e) => {
                self.stats.upload_failed();
                error!(path = %task.local_path.display(), error = %e, "Upload failed");
                None
            }
        }
    }

    /// Creates folder `name` under `parent` for the local directory `local_path`
    ///
    /// On failure the cache records the status and `None` is returned; the
    /// caller skips the subtree.
    pub async fn mkdir(
        &self,
        name: &str,
        parent: &RemoteObject,
        local_path: &Path,
    ) -> Option<RemoteObject> {
        match retry(&self.policy, "mkdir", || self.store.create_folder(name, &parent.id)).await {
            Ok(folder) => {
                if let Err(e) = self.cache.set_success(local_path, folder.clone()) {
                    warn!(path = %local_path.display(), error = %e, "Cannot record folder");
                }
                self.stats.folder_created();
                info!(path = %local_path.display(), id = %folder.id, "Created folder");
                Some(folder)
            }
            Err(e) => {
                error!(path = %local_path.display(), error = %e, "Folder creation failed");
                if let Err(cache_err) =
                    self.cache
                        .set_failed(local_path, e.status(), Some(e.to_string()))
                {
                    warn!(path = %local_path.display(), error = %cache_err, "Cannot record failure");
                }
                None
            }
        }
    }

    /// Deletes `object`; returns whether it is gone
    pub async fn rm(&self, object: &RemoteObject) -> bool {
        match retry(&self.policy, "delete", || self.store.delete(&object.id)).await {
            Ok(()) => {
                self.stats.object_deleted();
                info!(id = %object.id, name = %object.name, "Deleted remote object");
                true
            }
            Err(e) => {
                error!(id = %object.id, name = %object.name, error = %e, "Delete failed");
                false
            }
        }
    }

    /// Records a file that is already mirrored
    pub fn mark_synced(&self, local_path: &Path, remote: &RemoteObject, size: u64) {
        if let Err(e) = self.cache.set_success(local_path, remote.clone()) {
            warn!(path = %local_path.display(), error = %e, "Cannot record synced file");
        }
        self.progress.add(size);
        self.stats.file_skipped();
        debug!(path = %local_path.display(), "Already in sync");
    }

    pub fn cache(&self) -> &Arc<SyncStateCache> {
        &self.cache
    }
}
