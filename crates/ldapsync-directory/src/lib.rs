//! Directory (LDAP / Active Directory) export for ldapsync.
//!
//! This crate binds to one of several candidate directory servers, runs a
//! paged subtree search and turns the returned entries into
//! [`NormalizedRecord`](ldapsync_core::NormalizedRecord)s.

#![deny(missing_docs)]

mod client;
mod config;
mod entry;
mod error;
mod export;
mod normalize;
mod search;

pub use client::{DirectoryClient, DirectorySession};
pub use config::{
    AttributeFilter, DirectoryConfig, DEFAULT_ALIASES_ATTRIBUTE, DEFAULT_CONNECTION_TIMEOUT_SECS,
    DEFAULT_LDAP_PORT, DEFAULT_MAIL_ATTRIBUTE, DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_PAGE_SIZE,
    DEFAULT_USER_FILTER, MAX_PAGE_SIZE,
};
pub use entry::{AttributeEntry, RawEntry};
pub use error::{describe_error_text, DirectoryError};
pub use export::Exporter;
pub use normalize::{
    prepare_aliases, prepare_email, FieldNormalizer, FieldRule, FieldValue, MailboxNormalizer,
    ALIASES_FIELD, EMAIL_FIELD,
};
pub use search::{PageCursor, SearchPage, SearchRequest};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = ldapsync_core::Result<T>;
