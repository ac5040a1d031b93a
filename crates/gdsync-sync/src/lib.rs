//! gdsync Sync - one-way mirroring engine
//!
//! Provides:
//! - Depth-first reconciliation of a local tree against a remote folder
//! - Bounded-concurrency uploads
//! - Status-driven retry of remote calls
//! - A persistent cache of remote metadata keyed by local path
//!
//! ## Modules
//!
//! - [`engine`] - Entry point orchestrating one sync run
//! - [`planner`] - Recursive tree walker producing upload tasks
//! - [`runner`] - Executes upload tasks under a concurrency ceiling
//! - [`ops`] - Remote operations with per-item error degradation
//! - [`retry`] - Retry executor for single remote calls
//! - [`state`] - Sync state cache
//! - [`progress`] - Byte progress and run counters

pub mod engine;
pub mod ops;
pub mod planner;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod state;

use std::path::PathBuf;

use thiserror::Error;

pub use crate::retry::RetryError;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local root is missing or not a directory
    #[error("Local root does not exist or is not a directory: {0}")]
    LocalRootMissing(PathBuf),

    /// The configured remote root ID is malformed
    #[error("Invalid remote root: {0}")]
    InvalidRemoteRoot(#[from] gdsync_core::domain::DomainError),

    /// The remote root could not be fetched
    #[error("Cannot resolve remote root: {0}")]
    RemoteRoot(#[from] RetryError),

    /// The remote root exists but is not a folder
    #[error("Remote root {id} is not a folder (kind: {kind})")]
    RemoteRootNotFolder { id: String, kind: String },

    /// A path outside the cache prefix was used as a cache key
    #[error("Path {path} is outside the sync root {prefix}")]
    OutsidePrefix { path: PathBuf, prefix: PathBuf },

    /// Reading or writing the state file failed
    #[error("State file I/O error on {path}: {source}")]
    StateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file could not be (de)serialized
    #[error("State file format error: {0}")]
    StateFormat(#[from] serde_yaml::Error),

    /// A local directory could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The upload queue was closed before planning finished
    #[error("Upload queue closed")]
    QueueClosed,

    /// The planning task panicked or was cancelled
    #[error("Planner task failed: {0}")]
    Planner(String),
}
