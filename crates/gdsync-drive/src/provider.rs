//! DriveRemoteStore - IRemoteStore implementation for Google Drive v3
//!
//! Wraps the [`DriveClient`] and converts Drive file resources into
//! domain [`RemoteObject`] snapshots to fulfil the [`IRemoteStore`] port
//! contract.
//!
//! ## Design Notes
//!
//! - When a [`TokenManager`] is attached, each call first obtains a valid
//!   access token from it, so long runs survive access token expiry.
//! - HTTP error statuses pass through unchanged as payload-less
//!   [`RemoteResponse`] values.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use gdsync_core::domain::{ObjectKind, RemoteId, RemoteObject};
use gdsync_core::ports::remote_store::{IRemoteStore, ListPage, ListQuery, RemoteResponse};

use crate::auth::TokenManager;
use crate::client::{DriveClient, DriveFile, FileList};

// ============================================================================
// Conversions
// ============================================================================

/// Converts a [`DriveFile`] into a domain [`RemoteObject`]
fn drive_file_to_object(file: DriveFile) -> Result<RemoteObject> {
    let size = file.size_bytes();
    let kind = ObjectKind::from_mime_type(file.mime_type.as_deref());
    let id = RemoteId::new(file.id).context("Drive returned an invalid file ID")?;
    let parent_ids = file
        .parents
        .into_iter()
        .map(RemoteId::new)
        .collect::<Result<Vec<_>, _>>()
        .context("Drive returned an invalid parent ID")?;

    Ok(RemoteObject {
        id,
        name: file.name,
        kind,
        size: match kind {
            ObjectKind::File => size,
            ObjectKind::Folder => None,
        },
        parent_ids,
        mime_type: file.mime_type,
    })
}

fn file_list_to_page(list: FileList) -> Result<ListPage> {
    let objects = list
        .files
        .into_iter()
        .map(drive_file_to_object)
        .collect::<Result<Vec<_>>>()?;
    Ok(ListPage {
        objects,
        next_page_token: list.next_page_token,
    })
}

/// Applies `convert` to the payload, keeping status and status text
fn map_payload<T, U>(
    response: RemoteResponse<T>,
    convert: impl FnOnce(T) -> Result<U>,
) -> Result<RemoteResponse<U>> {
    let payload = response.payload.map(convert).transpose()?;
    Ok(RemoteResponse {
        payload,
        status: response.status,
        status_text: response.status_text,
    })
}

// ============================================================================
// DriveRemoteStore
// ============================================================================

/// Remote store implementation that delegates to the Google Drive v3 API
pub struct DriveRemoteStore {
    client: DriveClient,
    tokens: Option<Arc<TokenManager>>,
}

impl DriveRemoteStore {
    /// Creates a store using the fixed access token of `client`
    pub fn new(client: DriveClient) -> Self {
        Self {
            client,
            tokens: None,
        }
    }

    /// Creates a store that pulls fresh access tokens from `tokens`
    pub fn with_token_manager(client: DriveClient, tokens: Arc<TokenManager>) -> Self {
        Self {
            client,
            tokens: Some(tokens),
        }
    }

    async fn ensure_token(&self) -> Result<()> {
        if let Some(manager) = &self.tokens {
            let token = manager.access_token().await?;
            if token != self.client.access_token() {
                self.client.set_access_token(token);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DriveRemoteStore {
    async fn get_by_id(&self, id: &RemoteId) -> Result<RemoteResponse<RemoteObject>> {
        self.ensure_token().await?;
        debug!(id = %id, "DriveRemoteStore::get_by_id");
        let response = self.client.get_file(id).await?;
        map_payload(response, drive_file_to_object)
    }

    async fn list_page(
        &self,
        parent: &RemoteId,
        query: &ListQuery,
    ) -> Result<RemoteResponse<ListPage>> {
        self.ensure_token().await?;
        debug!(parent = %parent, name = ?query.name, "DriveRemoteStore::list_page");
        let response = self.client.list_children(parent, query).await?;
        map_payload(response, file_list_to_page)
    }

    async fn create_file(
        &self,
        name: &str,
        parent: &RemoteId,
        local_path: &Path,
    ) -> Result<RemoteResponse<RemoteObject>> {
        self.ensure_token().await?;
        debug!(name, parent = %parent, "DriveRemoteStore::create_file");
        let response = self.client.upload_file(name, parent, local_path).await?;
        map_payload(response, drive_file_to_object)
    }

    async fn create_folder(
        &self,
        name: &str,
        parent: &RemoteId,
    ) -> Result<RemoteResponse<RemoteObject>> {
        self.ensure_token().await?;
        debug!(name, parent = %parent, "DriveRemoteStore::create_folder");
        let response = self.client.create_folder(name, parent).await?;
        map_payload(response, drive_file_to_object)
    }

    async fn delete(&self, id: &RemoteId) -> Result<RemoteResponse<()>> {
        self.ensure_token().await?;
        debug!(id = %id, "DriveRemoteStore::delete");
        Ok(self.client.delete_file(id).await?)
    }
}

// ============================================================================
// Tests
// ============================================================================
