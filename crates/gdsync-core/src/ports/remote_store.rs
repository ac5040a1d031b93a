//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for the remote hierarchical object
//! store. The implementation targets Google Drive v3, but the trait only
//! exposes the five operations the sync engine needs.
//!
//! ## Design Notes
//!
//! - Every operation issues exactly one HTTP request and reports the raw
//!   outcome as a [`RemoteResponse`] (payload, status code, status text).
//!   Interpreting the status (retry, give up) is the caller's job.
//! - `Err` is reserved for transport-level failures (connection refused,
//!   unreadable local file, malformed success body). Uses `anyhow::Result`
//!   because those errors are adapter-specific.
//! - Uses `#[async_trait]` for async trait methods.

use std::path::Path;

use crate::domain::newtypes::RemoteId;
use crate::domain::remote_object::RemoteObject;

// ============================================================================
// RemoteResponse
// ============================================================================

/// Raw outcome of a single remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse<T> {
    /// Decoded body; present for successful (< 300) responses
    pub payload: Option<T>,
    /// HTTP status code
    pub status: u16,
    /// Reason phrase or API error message
    pub status_text: String,
}

impl<T> RemoteResponse<T> {
    /// Builds a successful response carrying `payload`
    pub fn ok(status: u16, payload: T) -> Self {
        Self {
            payload: Some(payload),
            status,
            status_text: "OK".to_string(),
        }
    }

    /// Builds a response without payload (any non-success status)
    pub fn status(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            payload: None,
            status,
            status_text: status_text.into(),
        }
    }

    /// Returns true for status codes below 300
    pub fn is_success(&self) -> bool {
        self.status < 300
    }
}

// ============================================================================
// Listing DTOs
// ============================================================================

/// Parameters of one listing page request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only return children with exactly this name
    pub name: Option<String>,
    /// Continuation token from the previous page
    pub page_token: Option<String>,
}

impl ListQuery {
    /// Query for all (non-trashed) children
    pub fn children() -> Self {
        Self::default()
    }

    /// Query for the children named `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            page_token: None,
        }
    }

    /// Returns the same query positioned at `token`
    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// One page of a children listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects on this page
    pub objects: Vec<RemoteObject>,
    /// Token for the next page (None on the last page)
    pub next_page_token: Option<String>,
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for remote object store operations
///
/// All methods assume that a valid access token is available; obtaining
/// and refreshing it happens before the store is constructed.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Fetches a single object's metadata
    async fn get_by_id(&self, id: &RemoteId) -> anyhow::Result<RemoteResponse<RemoteObject>>;

    /// Fetches one page of the non-trashed children of `parent`
    async fn list_page(
        &self,
        parent: &RemoteId,
        query: &ListQuery,
    ) -> anyhow::Result<RemoteResponse<ListPage>>;

    /// Creates a file named `name` under `parent`, streaming the content of
    /// `local_path`. The new file has exactly one parent.
    async fn create_file(
        &self,
        name: &str,
        parent: &RemoteId,
        local_path: &Path,
    ) -> anyhow::Result<RemoteResponse<RemoteObject>>;

    /// Creates a folder named `name` under `parent`
    async fn create_folder(
        &self,
        name: &str,
        parent: &RemoteId,
    ) -> anyhow::Result<RemoteResponse<RemoteObject>>;

    /// Deletes an object permanently
    async fn delete(&self, id: &RemoteId) -> anyhow::Result<RemoteResponse<()>>;
}
