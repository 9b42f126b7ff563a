//! Synchronisation API client for ldapsync.
//!
//! Submits the exported `{email, aliases}` records to the remote
//! synchronisation endpoint in a single request.

#![deny(missing_docs)]

pub mod client;

pub use client::{SyncClient, SyncClientBuilder, REMOTE_DATA_PATH};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = ldapsync_core::Result<T>;
