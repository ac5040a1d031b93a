//! gdsync Drive - Google Drive v3 client
//!
//! Provides async client for:
//! - OAuth2 authentication for installed applications (Authorization Code with PKCE)
//! - Drive file operations (get, list, create, delete)
//! - Streaming multipart uploads
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 flow, client secret loading and token persistence
//! - [`client`] - Drive v3 HTTP client
//! - [`provider`] - [`IRemoteStore`](gdsync_core::ports::IRemoteStore) adapter

pub mod auth;
pub mod client;
pub mod provider;

use thiserror::Error;

/// Errors that can occur when talking to the Drive API
///
/// HTTP error statuses are not errors at this level: they are reported
/// back to the caller as a status code plus status text.
#[derive(Debug, Error)]
pub enum DriveError {
    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A local file could not be read for upload
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request metadata could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A successful response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
