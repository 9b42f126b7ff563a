//! # ldapsync-core
//!
//! Core types and utilities shared by the ldapsync crates.
//!
//! This crate provides the error type, the exported record shape and the
//! configuration of the remote synchronisation API.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`record`] - The normalised `{email, aliases}` record
//! - [`config`] - Configuration of the synchronisation endpoint
//! - [`client`] - HTTP client settings

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod record;

// Re-export commonly used types
pub use error::{Error, Result};
pub use record::NormalizedRecord;
