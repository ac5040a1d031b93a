//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Raw remote object store operations (Google Drive)

pub mod remote_store;

pub use remote_store::{IRemoteStore, ListPage, ListQuery, RemoteResponse};
