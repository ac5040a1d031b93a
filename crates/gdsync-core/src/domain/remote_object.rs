//! Remote object snapshots
//!
//! A [`RemoteObject`] is an immutable snapshot of a file or folder in the
//! remote store as reported by the API. A changed remote state is represented
//! by a new snapshot replacing the old one, never by mutation.

use serde::{Deserialize, Serialize};

use super::newtypes::RemoteId;

/// MIME type Google Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Whether a remote object is a file or a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    File,
    Folder,
}

impl ObjectKind {
    /// Derives the kind from a Drive MIME type
    pub fn from_mime_type(mime_type: Option<&str>) -> Self {
        match mime_type {
            Some(FOLDER_MIME_TYPE) => Self::Folder,
            _ => Self::File,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

/// Metadata snapshot of one object in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Opaque object identifier
    pub id: RemoteId,
    /// Object name (unique names are not enforced by the store)
    pub name: String,
    /// File or folder
    pub kind: ObjectKind,
    /// Size in bytes (files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Parent folder IDs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_ids: Vec<RemoteId>,
    /// Raw MIME type as reported by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl RemoteObject {
    /// Returns true if this object is a folder
    pub fn is_folder(&self) -> bool {
        self.kind == ObjectKind::Folder
    }

    /// Returns true if this object is a file whose recorded size equals `local_size`
    pub fn matches_size(&self, local_size: u64) -> bool {
        self.kind == ObjectKind::File && self.size == Some(local_size)
    }
}
