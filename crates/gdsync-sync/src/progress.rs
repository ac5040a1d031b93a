//! Byte progress and per-run counters
//!
//! Both are shared between the planner and the upload tasks and only use
//! atomics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

/// Progress is reported each time this many bytes accumulate
pub const PROGRESS_STEP: u64 = 1 << 20;

/// Cumulative count of bytes considered during a run
///
/// Both skipped (already mirrored) and uploaded files count.
#[derive(Debug, Default)]
pub struct Progress {
    bytes: AtomicU64,
    last_reported: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the counter at the start of a run
    pub fn reset(&self) {
        self.bytes.store(0, Ordering::SeqCst);
        self.last_reported.store(0, Ordering::SeqCst);
    }

    /// Adds `bytes` and logs when another step has accumulated since the last report
    pub fn add(&self, bytes: u64) -> u64 {
        let total = self.bytes.fetch_add(bytes, Ordering::SeqCst) + bytes;

        let last = self.last_reported.load(Ordering::SeqCst);
        if total.saturating_sub(last) > PROGRESS_STEP
            && self
                .last_reported
                .compare_exchange(last, total, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            info!(bytes = total, "Completed bytes: {}", format_thousands(total));
        }

        total
    }

    pub fn total(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }
}

/// Formats `n` with `,` as thousands separator
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// RunStats
// ============================================================================

/// Counters of the remote mutations performed in one run
#[derive(Debug, Default)]
pub struct RunStats {
    files_uploaded: AtomicU64,
    files_skipped: AtomicU64,
    upload_failures: AtomicU64,
    folders_created: AtomicU64,
    objects_deleted: AtomicU64,
}

/// Plain copy of [`RunStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStatsSnapshot {
    pub files_uploaded: u64,
    pub files_skipped: u64,
    pub upload_failures: u64,
    pub folders_created: u64,
    pub objects_deleted: u64,
}

impl RunStats {
    pub fn reset(&self) {
        for counter in [
            &self.files_uploaded,
            &self.files_skipped,
            &self.upload_failures,
            &self.folders_created,
            &self.objects_deleted,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    pub fn file_uploaded(&self) {
        self.files_uploaded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn file_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn upload_failed(&self) {
        self.upload_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn folder_created(&self) {
        self.folders_created.fetch_add(1, Ordering::SeqCst);
    }

    pub fn object_deleted(&self) {
        self.objects_deleted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            files_uploaded: self.files_uploaded.load(Ordering::SeqCst),
            files_skipped: self.files_skipped.load(Ordering::SeqCst),
            upload_failures: self.upload_failures.load(Ordering::SeqCst),
            folders_created: self.folders_created.load(Ordering::SeqCst),
            objects_deleted: self.objects_deleted.load(Ordering::SeqCst),
        }
    }
}
