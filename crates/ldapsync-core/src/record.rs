//! The record shape submitted to the synchronisation API.

use serde::{Deserialize, Serialize};

/// A mailbox identity with its alternate addresses.
///
/// Produced by the directory export; `email` is lowercase and never empty,
/// `aliases` holds no duplicates and never repeats the email or its local-part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Primary email address.
    pub email: String,
    /// Alias addresses in directory order.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl NormalizedRecord {
    /// Creates a record from already normalised parts.
    #[must_use]
    pub fn new(email: impl Into<String>, aliases: Vec<String>) -> Self {
        Self {
            email: email.into(),
            aliases,
        }
    }

    /// Returns the part of the email before the first `@`, if there is one.
    #[must_use]
    pub fn local_part(&self) -> Option<&str> {
        self.email.split_once('@').map(|(local, _)| local)
    }
}
