//! Domain entities
//!
//! This module contains the core domain types for gdsync:
//! - Newtypes for type-safe remote identifiers
//! - Remote object snapshots (files and folders)
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod remote_object;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::RemoteId;
pub use remote_object::{ObjectKind, RemoteObject, FOLDER_MIME_TYPE};
