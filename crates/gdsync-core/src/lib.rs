//! gdsync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteId`, `RemoteObject`, `ObjectKind`
//! - **Port definitions** - `IRemoteStore`, the five raw remote-store operations
//! - **Configuration** - the YAML `Config` read by the engine and the CLI
//!
//! # Architecture
//!
//! The domain module contains plain data with no I/O. Ports define the
//! trait interface that the Drive adapter implements and that the sync
//! engine consumes.

pub mod config;
pub mod domain;
pub mod ports;
