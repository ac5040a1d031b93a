//! Sync state cache
//!
//! Persistent mapping from local path to the last known remote object.
//! Keys are `/`-separated paths relative to the local root (the
//! `path_prefix`), so the cache survives moving the local tree.
//!
//! The whole map lives behind one mutex. Upload completions running on
//! different tasks write to it concurrently; no guard is ever held across
//! an `.await`.
//!
//! On disk the cache is a YAML document:
//!
//! ```yaml
//! path_prefix: /home/me/GoogleDrive
//! state:
//!   docs/a.txt:
//!     ok: true
//!     remote_object: { id: 1AbC, name: a.txt, kind: file, size: 100 }
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use gdsync_core::domain::RemoteObject;

use crate::SyncError;

// ============================================================================
// CacheEntry
// ============================================================================

/// Last known remote state of one local path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// True when `remote_object` reflects the local entry
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_object: Option<RemoteObject>,
    /// HTTP status of the failing response, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Error message of the last failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CacheEntry {
    pub fn success(remote_object: RemoteObject) -> Self {
        Self {
            ok: true,
            remote_object: Some(remote_object),
            http_status: None,
            error: None,
        }
    }

    pub fn failed(http_status: Option<u16>, error: Option<String>) -> Self {
        Self {
            ok: false,
            remote_object: None,
            http_status,
            error,
        }
    }

    /// The remote object, only for successful entries
    pub fn remote_object(&self) -> Option<&RemoteObject> {
        if self.ok {
            self.remote_object.as_ref()
        } else {
            None
        }
    }

    fn is_consistent(&self) -> bool {
        !self.ok || self.remote_object.is_some()
    }
}

// ============================================================================
// SyncStateCache
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    path_prefix: String,
    #[serde(default)]
    state: BTreeMap<String, CacheEntry>,
}

/// Process-wide cache of remote metadata keyed by local path
#[derive(Debug)]
pub struct SyncStateCache {
    /// Where the cache is persisted
    state_file: PathBuf,
    /// Local root stripped from paths to form keys
    path_prefix: PathBuf,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl SyncStateCache {
    /// Creates an empty cache for `path_prefix`
    pub fn new(state_file: impl Into<PathBuf>, path_prefix: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            path_prefix: path_prefix.into(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Loads the cache from `state_file`
    ///
    /// A missing file yields an empty cache. A cache written for another
    /// root is re-based onto `path_prefix`.
    pub async fn load(
        state_file: impl Into<PathBuf>,
        path_prefix: impl Into<PathBuf>,
    ) -> Result<Self, SyncError> {
        let state_file = state_file.into();
        let path_prefix = path_prefix.into();

        let content = match tokio::fs::read_to_string(&state_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %state_file.display(), "No sync state found, starting empty");
                return Ok(Self::new(state_file, path_prefix));
            }
            Err(source) => {
                return Err(SyncError::StateIo {
                    path: state_file,
                    source,
                })
            }
        };

        let persisted: PersistedState = serde_yaml::from_str(&content)?;
        if Path::new(&persisted.path_prefix) != path_prefix.as_path() {
            info!(
                stored = %persisted.path_prefix,
                configured = %path_prefix.display(),
                "Sync state was written for another root, re-basing"
            );
        }

        let total = persisted.state.len();
        let entries: BTreeMap<_, _> = persisted
            .state
            .into_iter()
            .filter(|(key, entry)| {
                let keep = entry.is_consistent();
                if !keep {
                    debug!(key = %key, "Dropping cache entry marked ok without remote object");
                }
                keep
            })
            .collect();

        info!(
            path = %state_file.display(),
            entries = entries.len(),
            dropped = total - entries.len(),
            "Loaded sync state"
        );

        Ok(Self {
            state_file,
            path_prefix,
            entries: Mutex::new(entries),
        })
    }

    /// Writes the cache to its state file, replacing the previous content
    pub async fn save(&self) -> Result<(), SyncError> {
        let yaml = {
            let entries = self.lock();
            let persisted = PersistedState {
                path_prefix: self.path_prefix.to_string_lossy().into_owned(),
                state: entries.clone(),
            };
            serde_yaml::to_string(&persisted)?
        };

        let io_err = |source| SyncError::StateIo {
            path: self.state_file.clone(),
            source,
        };

        if let Some(parent) = self.state_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let mut tmp = self.state_file.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, yaml).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.state_file)
            .await
            .map_err(io_err)?;

        debug!(path = %self.state_file.display(), "Saved sync state");
        Ok(())
    }

    /// Cache key of `path`: the `/`-joined components below the prefix
    pub fn key_for(&self, path: &Path) -> Result<String, SyncError> {
        let outside = || SyncError::OutsidePrefix {
            path: path.to_path_buf(),
            prefix: self.path_prefix.clone(),
        };

        let relative = path.strip_prefix(&self.path_prefix).map_err(|_| outside())?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return Err(outside()),
            }
        }
        Ok(parts.join("/"))
    }

    /// Entry for `path`, or a default (`ok: false`) entry when unknown
    ///
    /// Paths outside the prefix are reported and treated as unknown.
    pub fn get(&self, path: &Path) -> CacheEntry {
        match self.key_for(path) {
            Ok(key) => self.lock().get(&key).cloned().unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Cache lookup outside the sync root");
                CacheEntry::default()
            }
        }
    }

    /// Records that `path` is mirrored by `remote_object`
    pub fn set_success(&self, path: &Path, remote_object: RemoteObject) -> Result<(), SyncError> {
        let key = self.key_for(path)?;
        self.lock().insert(key, CacheEntry::success(remote_object));
        Ok(())
    }

    /// Records that mirroring `path` failed
    pub fn set_failed(
        &self,
        path: &Path,
        http_status: Option<u16>,
        error: Option<String>,
    ) -> Result<(), SyncError> {
        let key = self.key_for(path)?;
        self.lock().insert(key, CacheEntry::failed(http_status, error));
        Ok(())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> BTreeMap<String, CacheEntry> {
        self.lock().clone()
    }

    pub fn path_prefix(&self) -> &Path {
        &self.path_prefix
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Flushes the cache every `period` until `cancel` fires
    pub fn spawn_autosave(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = cache.save().await {
                            error!(error = %e, "Periodic sync state save failed");
                        }
                    }
                }
            }
            debug!("Sync state autosave stopped");
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
