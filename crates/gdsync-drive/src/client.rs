//! Google Drive v3 API client
//!
//! Provides a typed HTTP client for the handful of Drive endpoints the sync
//! engine needs. Handles authentication headers, JSON deserialization, query
//! construction and multipart uploads.
//!
//! Every method issues exactly one HTTP request. Error statuses are not
//! turned into `Err`: they come back as a [`RemoteResponse`] without payload
//! so the caller can decide whether to retry.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gdsync_core::domain::RemoteId;
//! use gdsync_drive::client::DriveClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here");
//! let root: RemoteId = "root".parse()?;
//! let response = client.get_file(&root).await?;
//! println!("status {}", response.status);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::RwLock;

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use gdsync_core::domain::{RemoteId, FOLDER_MIME_TYPE};
use gdsync_core::ports::remote_store::{ListQuery, RemoteResponse};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::DriveError;

/// Base URL for Drive API v3 metadata calls
const DRIVE_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Drive API v3 media uploads
const DRIVE_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Partial response selector for single objects
const FILE_FIELDS: &str = "id, name, mimeType, size, parents";

/// Partial response selector for listings
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, parents)";

/// Separator between the metadata and media parts of an upload
const MULTIPART_BOUNDARY: &str = "gdsync_multipart_boundary_7f3a";

// ============================================================================
// Drive API response types
// ============================================================================

/// File resource as returned by the Drive API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// Drive file ID
    pub id: String,
    /// File name
    pub name: String,
    /// MIME type (folders use [`FOLDER_MIME_TYPE`])
    pub mime_type: Option<String>,
    /// Size in bytes; Drive encodes int64 values as decimal strings
    pub size: Option<String>,
    /// Parent folder IDs
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Returns the size as a number, if present and well-formed
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// One page of `files.list`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    /// Files on this page
    #[serde(default)]
    pub files: Vec<DriveFile>,
    /// Continuation token, absent on the last page
    pub next_page_token: Option<String>,
}

/// Metadata body for `files.create`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    parents: [&'a str; 1],
}

/// Error envelope returned with 4xx/5xx statuses
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ============================================================================
// Query helpers
// ============================================================================

/// Escapes a value for use inside a single-quoted Drive query literal
pub fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Builds the `q` parameter selecting the non-trashed children of `parent`,
/// optionally restricted to an exact name
pub fn children_query(parent: &RemoteId, name: Option<&str>) -> String {
    let mut q = format!("'{}' in parents and trashed = false", parent.as_str());
    if let Some(name) = name {
        q.push_str(&format!(" and name = '{}'", escape_query_value(name)));
    }
    q
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive v3 calls
///
/// Wraps `reqwest::Client` with authentication headers and base URL
/// construction. The access token can be swapped while requests are in
/// flight elsewhere.
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for metadata requests
    api_base_url: String,
    /// Base URL for upload requests
    upload_base_url: String,
    /// Current OAuth2 access token
    access_token: RwLock<String>,
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(access_token, DRIVE_API_BASE_URL, DRIVE_UPLOAD_BASE_URL)
    }

    /// Creates a new DriveClient with custom base URLs (useful for testing)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        api_base_url: impl Into<String>,
        upload_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base_url: api_base_url.into(),
            upload_base_url: upload_base_url.into(),
            access_token: RwLock::new(access_token.into()),
        }
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&self, token: impl Into<String>) {
        let mut guard = self
            .access_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = token.into();
        debug!("Updated DriveClient access token");
    }

    /// Returns a copy of the current access token
    pub fn access_token(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Creates an authenticated metadata request for `path` (e.g. "/files")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(self.access_token())
    }

    /// Creates an authenticated upload request for `path`
    fn upload_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.upload_base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(self.access_token())
    }

    /// `GET /files/{id}`
    pub async fn get_file(&self, id: &RemoteId) -> Result<RemoteResponse<DriveFile>, DriveError> {
        debug!(id = %id, "Fetching file metadata");
        let response = self
            .request(Method::GET, &format!("/files/{}", id.as_str()))
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await?;
        read_json(response).await
    }

    /// `GET /files` restricted to the non-trashed children of `parent`
    pub async fn list_children(
        &self,
        parent: &RemoteId,
        query: &ListQuery,
    ) -> Result<RemoteResponse<FileList>, DriveError> {
        let q = children_query(parent, query.name.as_deref());
        debug!(q = %q, page_token = ?query.page_token, "Listing children");

        let mut request = self.request(Method::GET, "/files").query(&[
            ("q", q.as_str()),
            ("fields", LIST_FIELDS),
            ("spaces", "drive"),
        ]);
        if let Some(token) = &query.page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        read_json(request.send().await?).await
    }

    /// `POST /files` creating a folder under `parent`
    pub async fn create_folder(
        &self,
        name: &str,
        parent: &RemoteId,
    ) -> Result<RemoteResponse<DriveFile>, DriveError> {
        debug!(name, parent = %parent, "Creating folder");
        let metadata = CreateMetadata {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: [parent.as_str()],
        };
        let response = self
            .request(Method::POST, "/files")
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await?;
        read_json(response).await
    }

    /// `POST /upload/files?uploadType=multipart` streaming `local_path`
    ///
    /// The file content is streamed from disk; it is never loaded in memory
    /// as a whole. The created file always has a single parent.
    pub async fn upload_file(
        &self,
        name: &str,
        parent: &RemoteId,
        local_path: &Path,
    ) -> Result<RemoteResponse<DriveFile>, DriveError> {
        let metadata = CreateMetadata {
            name,
            mime_type: None,
            parents: [parent.as_str()],
        };
        let (body, length) = multipart_body(&metadata, local_path).await?;
        debug!(name, parent = %parent, length, "Uploading file");

        let response = self
            .upload_request(Method::POST, "/files")
            .query(&[
                ("uploadType", "multipart"),
                ("enforceSingleParent", "true"),
                ("fields", FILE_FIELDS),
            ])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .header(CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// `DELETE /files/{id}` (permanent, bypasses the trash)
    pub async fn delete_file(&self, id: &RemoteId) -> Result<RemoteResponse<()>, DriveError> {
        debug!(id = %id, "Deleting file");
        let response = self
            .request(Method::DELETE, &format!("/files/{}", id.as_str()))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() < 300 {
            Ok(success(status, ()))
        } else {
            error_status(response).await
        }
    }

    /// Returns the base URL for metadata requests
    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }
}

// ============================================================================
// Response handling
// ============================================================================

fn success<T>(status: StatusCode, payload: T) -> RemoteResponse<T> {
    RemoteResponse {
        payload: Some(payload),
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("OK").to_string(),
    }
}

/// Decodes a success body, or converts an error status into a payload-less response
async fn read_json<T: DeserializeOwned>(
    response: Response,
) -> Result<RemoteResponse<T>, DriveError> {
    let status = response.status();
    if status.as_u16() >= 300 {
        return error_status(response).await;
    }

    let body = response.bytes().await?;
    let payload = serde_json::from_slice(&body)
        .map_err(|e| DriveError::InvalidResponse(format!("{e} (status {status})")))?;
    Ok(success(status, payload))
}

/// Extracts the status text of an error response
///
/// Prefers the API error message and falls back to the canonical reason.
async fn error_status<T>(response: Response) -> Result<RemoteResponse<T>, DriveError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let status_text = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string()
        });

    debug!(status = status.as_u16(), status_text = %status_text, "Drive API returned error status");
    Ok(RemoteResponse::status(status.as_u16(), status_text))
}

/// Builds a streaming `multipart/related` body and returns it with its exact length
async fn multipart_body(
    metadata: &CreateMetadata<'_>,
    local_path: &Path,
) -> Result<(reqwest::Body, u64), DriveError> {
    let file = tokio::fs::File::open(local_path).await?;
    let file_len = file.metadata().await?.len();

    let head = format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{json}\r\n\
         --{b}\r\nContent-Type: application/octet-stream\r\n\r\n",
        b = MULTIPART_BOUNDARY,
        json = serde_json::to_string(metadata)?,
    );
    let tail = format!("\r\n--{MULTIPART_BOUNDARY}--\r\n");
    let length = head.len() as u64 + file_len + tail.len() as u64;

    let parts = stream::iter([Ok::<_, std::io::Error>(Bytes::from(head))])
        .chain(ReaderStream::new(file))
        .chain(stream::iter([Ok(Bytes::from(tail))]));

    Ok((reqwest::Body::wrap_stream(parts), length))
}
