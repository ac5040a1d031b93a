//! One-way synchronization engine
//!
//! The [`SyncEngine`] mirrors a local directory tree onto a remote folder.
//!
//! ## Sync Flow
//!
//! 1. **Preconditions**: the local root must be a directory and the remote
//!    root must resolve to a folder; either failure aborts the run
//! 2. **Planning**: a [`TreePlanner`] walks the local tree on its own task,
//!    creating and replacing remote folders inline and queueing one
//!    [`UploadTask`] per file without a valid remote copy
//! 3. **Uploads**: a [`ConcurrencyRunner`] drains the queue under the
//!    configured ceiling; each upload goes through the retry executor
//! 4. **Summary**: counters collected during the run become a [`SyncReport`]
//!
//! Per-item failures (one upload, one folder, one listing) are logged and
//! never abort the run. Persisting the cache is left to the caller so it
//! can happen whatever the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

use gdsync_core::config::{expand_tilde, Config};
use gdsync_core::domain::RemoteId;
use gdsync_core::ports::IRemoteStore;

use crate::ops::SyncOps;
use crate::planner::{TreePlanner, UploadTask};
use crate::progress::{format_thousands, Progress, RunStats};
use crate::retry::RetryPolicy;
use crate::runner::ConcurrencyRunner;
use crate::state::SyncStateCache;
use crate::SyncError;

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of a completed synchronization run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Files uploaded to the remote store
    pub files_uploaded: u64,
    /// Files whose remote copy already matched
    pub files_skipped: u64,
    /// Uploads that failed and are left for the next run
    pub upload_failures: u64,
    /// Remote folders created
    pub folders_created: u64,
    /// Remote objects deleted (replaced files, wrong kinds, duplicates)
    pub objects_deleted: u64,
    /// Bytes of every file considered, skipped or uploaded
    pub bytes_considered: u64,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Number of remote mutations performed
    pub fn remote_changes(&self) -> u64 {
        self.files_uploaded + self.folders_created + self.objects_deleted
    }
}

// ============================================================================
// SyncSettings
// ============================================================================

/// Engine parameters resolved from the configuration
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Local directory mirrored by the engine
    pub local_root: PathBuf,
    /// Remote folder receiving the mirror
    pub remote_root_id: RemoteId,
    /// Maximum number of uploads in flight
    pub max_concurrency: usize,
    /// Retry policy applied to every remote call
    pub retry: RetryPolicy,
}

impl SyncSettings {
    pub fn new(local_root: impl Into<PathBuf>, remote_root_id: RemoteId) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root_id,
            max_concurrency: 5,
            retry: RetryPolicy::default(),
        }
    }

    /// Resolves the sync section of `config`, expanding `~` in the local root
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        let remote_root_id = RemoteId::new(config.sync.remote_root_id.clone())?;
        Ok(Self {
            local_root: expand_tilde(&config.sync.local_root),
            remote_root_id,
            max_concurrency: config.sync.max_concurrency.max(1),
            retry: RetryPolicy::new(config.retransmit_interval()),
        })
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Mirrors a local tree onto a remote folder
pub struct SyncEngine {
    settings: SyncSettings,
    ops: Arc<SyncOps>,
    cache: Arc<SyncStateCache>,
    progress: Arc<Progress>,
    stats: Arc<RunStats>,
}

impl SyncEngine {
    /// Creates an engine writing its results into `cache`
    pub fn new(
        store: Arc<dyn IRemoteStore>,
        cache: Arc<SyncStateCache>,
        settings: SyncSettings,
    ) -> Self {
        if cache.path_prefix() != settings.local_root.as_path() {
            warn!(
                prefix = %cache.path_prefix().display(),
                root = %settings.local_root.display(),
                "Sync state prefix differs from the local root"
            );
        }

        let progress = Arc::new(Progress::new());
        let stats = Arc::new(RunStats::default());
        let ops = Arc::new(SyncOps::new(
            store,
            settings.retry,
            Arc::clone(&cache),
            Arc::clone(&progress),
            Arc::clone(&stats),
        ));

        Self {
            settings,
            ops,
            cache,
            progress,
            stats,
        }
    }

    /// Creates an engine from the loaded configuration
    pub fn from_config(
        store: Arc<dyn IRemoteStore>,
        cache: Arc<SyncStateCache>,
        config: &Config,
    ) -> Result<Self, SyncError> {
        Ok(Self::new(store, cache, SyncSettings::from_config(config)?))
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<SyncStateCache> {
        &self.cache
    }

    /// Runs one synchronization
    ///
    /// Fails only when a precondition does not hold or the local root
    /// cannot be read; every other failure is logged and counted.
    #[tracing::instrument(
        skip(self),
        fields(
            root = %self.settings.local_root.display(),
            remote = %self.settings.remote_root_id
        )
    )]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let local_root = self.settings.local_root.clone();

        match tokio::fs::metadata(&local_root).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(SyncError::LocalRootMissing(local_root)),
        }

        self.progress.reset();
        self.stats.reset();

        let remote_root = self.ops.get_by_id(&self.settings.remote_root_id).await?;
        if !remote_root.is_folder() {
            return Err(SyncError::RemoteRootNotFolder {
                id: remote_root.id.to_string(),
                kind: remote_root.kind.to_string(),
            });
        }
        if let Err(e) = self.cache.set_success(&local_root, remote_root.clone()) {
            warn!(error = %e, "Cannot record remote root");
        }

        info!(
            max_concurrency = self.settings.max_concurrency,
            cached = self.cache.len(),
            "Starting sync"
        );

        let (tx, rx) = mpsc::channel::<UploadTask>(self.settings.max_concurrency);
        let planner = TreePlanner::new(Arc::clone(&self.ops), tx);
        // Dropping the run (e.g. on interrupt) must stop the planner too
        let planning =
            AbortOnDropHandle::new(tokio::spawn(planner.plan(local_root, remote_root)));

        let ops = Arc::clone(&self.ops);
        let uploads = ConcurrencyRunner::new(self.settings.max_concurrency)
            .run(rx, move |task: UploadTask| {
                let ops = Arc::clone(&ops);
                async move {
                    ops.upload_file(&task).await;
                }
            })
            .await;
        debug!(uploads, "Upload queue finished");

        match planning.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(SyncError::Planner(e.to_string())),
        }

        let stats = self.stats.snapshot();
        let report = SyncReport {
            files_uploaded: stats.files_uploaded,
            files_skipped: stats.files_skipped,
            upload_failures: stats.upload_failures,
            folders_created: stats.folders_created,
            objects_deleted: stats.objects_deleted,
            bytes_considered: self.progress.total(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            files_uploaded = report.files_uploaded,
            files_skipped = report.files_skipped,
            upload_failures = report.upload_failures,
            folders_created = report.folders_created,
            objects_deleted = report.objects_deleted,
            duration_ms = report.duration_ms,
            "Sync finished, {} bytes considered",
            format_thousands(report.bytes_considered)
        );

        Ok(report)
    }
}
