//! Paged search request and response types.

use crate::config::DirectoryConfig;
use crate::entry::RawEntry;

/// Opaque paged-results cookie issued by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor(Vec<u8>);

impl PageCursor {
    /// Cursor for the first page.
    #[must_use]
    pub const fn start() -> Self {
        Self(Vec::new())
    }

    /// An empty cursor marks the last page.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw cookie bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for PageCursor {
    fn from(cookie: Vec<u8>) -> Self {
        Self(cookie)
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Entries returned for this page, referrals included.
    pub entries: Vec<RawEntry>,
    /// Cursor for the next page, if the server returned a paged-results control.
    pub cursor: Option<PageCursor>,
}

impl SearchPage {
    /// Cursor to continue with, or `None` on the last page.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&PageCursor> {
        self.cursor.as_ref().filter(|cursor| !cursor.is_empty())
    }
}

/// A subtree search issued page by page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    base_dn: String,
    filter: String,
    attributes: Vec<String>,
    page_size: u32,
}

impl SearchRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(
        base_dn: impl Into<String>,
        filter: impl Into<String>,
        attributes: Vec<String>,
        page_size: u32,
    ) -> Self {
        Self {
            base_dn: base_dn.into(),
            filter: filter.into(),
            attributes,
            page_size,
        }
    }

    /// Builds the export search from the directory configuration.
    #[must_use]
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(
            config.base_dn(),
            config.user_filter(),
            config.attributes().search_attributes(),
            config.page_size(),
        )
    }

    /// Overrides the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Search base.
    #[must_use]
    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    /// Search filter.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Requested attributes.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Entries per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Whether enough pages were fetched to cover `limit`.
    ///
    /// Counts whole pages, so the collected entries may exceed the limit by up
    /// to one page minus one entry. A limit of zero means no limit.
    #[must_use]
    pub fn page_limit_reached(&self, pages: usize, limit: Option<usize>) -> bool {
        limit.is_some_and(|limit| limit > 0 && limit <= self.page_size as usize * pages)
    }
}
