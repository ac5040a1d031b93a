//! Recursive tree planner
//!
//! Walks the local tree depth-first and reconciles every directory against
//! its remote counterpart:
//!
//! 1. Local entries are sorted so files come before directories.
//! 2. Remote children come from the cache when it knows every local entry
//!    of the directory, otherwise from a live listing (which is written back
//!    into the cache).
//! 3. Remote objects of the wrong kind or size are deleted.
//! 4. Files without a valid remote copy become [`UploadTask`]s pushed onto a
//!    bounded channel. Folders are created inline before recursing, so a
//!    task is only queued once its parent folder exists.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use gdsync_core::domain::RemoteObject;

use crate::ops::SyncOps;
use crate::SyncError;

/// A deferred upload of one local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Absolute local path
    pub local_path: PathBuf,
    /// File name, used as the remote name
    pub name: String,
    /// Local size when the task was planned
    pub size: u64,
    /// Remote folder receiving the file
    pub parent: RemoteObject,
}

/// Kind of a local directory entry; the order is the processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EntryKind {
    File,
    Dir,
}

#[derive(Debug)]
struct LocalEntry {
    path: PathBuf,
    name: String,
    kind: EntryKind,
}

/// Lists `dir`, keeping regular files and directories with UTF-8 names
///
/// Symlinks and special files are skipped.
async fn read_local_entries(dir: &Path) -> Result<Vec<LocalEntry>, SyncError> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(path = %path.display(), name = ?raw, "Skipping entry with non UTF-8 name");
                continue;
            }
        };

        let file_type = entry.file_type().await?;
        let kind = if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else {
            debug!(path = %path.display(), "Skipping entry that is neither file nor directory");
            continue;
        };

        entries.push(LocalEntry { path, name, kind });
    }

    entries.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

/// A remote name that can be mapped to a single local path component
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

/// Producer side of a sync run
pub struct TreePlanner {
    ops: Arc<SyncOps>,
    tx: mpsc::Sender<UploadTask>,
}

impl TreePlanner {
    pub fn new(ops: Arc<SyncOps>, tx: mpsc::Sender<UploadTask>) -> Self {
        Self { ops, tx }
    }

    /// Walks `local_root` against `remote_root`, queueing upload tasks
    ///
    /// The channel closes when this returns.
    pub async fn plan(self, local_root: PathBuf, remote_root: RemoteObject) -> Result<(), SyncError> {
        self.walk(&local_root, &remote_root).await
    }

    fn walk<'a>(
        &'a self,
        dir: &'a Path,
        remote_dir: &'a RemoteObject,
    ) -> Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send + 'a>> {
        Box::pin(async move {
            info!(path = %dir.display(), remote = %remote_dir.id, "Entering directory");

            let entries = read_local_entries(dir).await?;
            let mut remote = self.remote_children(dir, &entries, remote_dir).await;

            for entry in &entries {
                match entry.kind {
                    EntryKind::File => self.reconcile_file(entry, remote_dir, &mut remote).await?,
                    EntryKind::Dir => self.reconcile_dir(entry, remote_dir, &mut remote).await?,
                }
            }
            Ok(())
        })
    }

    /// Remote children of `remote_dir` keyed by name
    async fn remote_children(
        &self,
        dir: &Path,
        entries: &[LocalEntry],
        remote_dir: &RemoteObject,
    ) -> BTreeMap<String, RemoteObject> {
        let cache = self.ops.cache();

        let mut cached = BTreeMap::new();
        for entry in entries {
            let hit = cache.get(&entry.path);
            if let Some(object) = hit.remote_object() {
                // Entries recorded under another parent (e.g. a different remote root) are stale
                if object.parent_ids.is_empty() || object.parent_ids.contains(&remote_dir.id) {
                    cached.insert(entry.name.clone(), object.clone());
                }
            }
        }

        if cached.len() == entries.len() {
            debug!(path = %dir.display(), entries = entries.len(), "Using cached remote state");
            return cached;
        }

        debug!(
            path = %dir.display(),
            cached = cached.len(),
            local = entries.len(),
            "Cache incomplete, listing remote folder"
        );
        let live = self.ops.list_children(remote_dir).await;
        for (name, object) in &live {
            if !is_plain_name(name) {
                continue;
            }
            if let Err(e) = cache.set_success(&dir.join(name), object.clone()) {
                warn!(error = %e, "Cannot backfill cache");
            }
        }
        live
    }

    async fn reconcile_file(
        &self,
        entry: &LocalEntry,
        remote_dir: &RemoteObject,
        remote: &mut BTreeMap<String, RemoteObject>,
    ) -> Result<(), SyncError> {
        let size = match tokio::fs::metadata(&entry.path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "Cannot stat file, skipping");
                return Ok(());
            }
        };

        if let Some(existing) = remote.remove(&entry.name) {
            if existing.matches_size(size) {
                self.ops.mark_synced(&entry.path, &existing, size);
                remote.insert(entry.name.clone(), existing);
                return Ok(());
            }

            info!(
                path = %entry.path.display(),
                local_size = size,
                remote_size = ?existing.size,
                remote_kind = %existing.kind,
                "Remote copy differs, replacing"
            );
            if self.ops.rm(&existing).await {
                if let Err(e) = self.ops.cache().set_failed(
                    &entry.path,
                    None,
                    Some("remote copy deleted pending re-upload".to_string()),
                ) {
                    warn!(error = %e, "Cannot record replacement");
                }
            }
        }

        let task = UploadTask {
            local_path: entry.path.clone(),
            name: entry.name.clone(),
            size,
            parent: remote_dir.clone(),
        };
        self.tx.send(task).await.map_err(|_| SyncError::QueueClosed)
    }

    async fn reconcile_dir(
        &self,
        entry: &LocalEntry,
        remote_dir: &RemoteObject,
        remote: &mut BTreeMap<String, RemoteObject>,
    ) -> Result<(), SyncError> {
        if let Some(existing) = remote.get(&entry.name) {
            if !existing.is_folder() {
                info!(
                    path = %entry.path.display(),
                    id = %existing.id,
                    "Remote object is not a folder, replacing"
                );
                let existing = existing.clone();
                self.ops.rm(&existing).await;
                remote.remove(&entry.name);
            }
        }

        let folder = match remote.get(&entry.name) {
            Some(folder) => folder.clone(),
            None => match self.ops.mkdir(&entry.name, remote_dir, &entry.path).await {
                Some(folder) => {
                    remote.insert(entry.name.clone(), folder.clone());
                    folder
                }
                None => {
                    warn!(path = %entry.path.display(), "Skipping subtree");
                    return Ok(());
                }
            },
        };

        match self.walk(&entry.path, &folder).await {
            Ok(()) => Ok(()),
            Err(SyncError::QueueClosed) => Err(SyncError::QueueClosed),
            Err(e) => {
                error!(path = %entry.path.display(), error = %e, "Directory walk failed");
                Ok(())
            }
        }
    }
}
