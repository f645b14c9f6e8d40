//! Typed response wrapper returned by the orchestration layer
//!
//! Generics carry the decoded rows; fatal errors travel as `Err` at the
//! call site, so a [`Response`] in hand always represents a completed
//! operation, possibly with non-fatal errors attached.

use crate::error::StoreError;
use crate::repository::RepoResponse;

/// Result of an orchestrated operation
#[derive(Debug, Clone)]
pub struct Response<M> {
    /// Rows matching the filter
    pub total_rows: i64,
    /// `ceil(total_rows / page_size)` when paginated
    pub total_pages: i64,
    /// Page size echoed from the request
    pub page_size: i64,
    /// Current page echoed from the request
    pub current_page: i64,
    /// Decoded result rows
    pub list: Vec<M>,
    /// Non-fatal errors collected along the way
    pub errors: Vec<StoreError>,
}

impl<M> Default for Response<M> {
    fn default() -> Self {
        Self {
            total_rows: 0,
            total_pages: 0,
            page_size: 0,
            current_page: 0,
            list: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<M> Response<M> {
    /// An empty response
    pub fn empty() -> Self {
        Self::default()
    }

    /// First decoded row, if any
    pub fn first(&self) -> Option<&M> {
        self.list.first()
    }

    /// Decoded row at `index`, if present
    pub fn at(&self, index: usize) -> Option<&M> {
        self.list.get(index)
    }

    /// True when no rows were decoded
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Fold another response into this one
    ///
    /// Non-fatal errors are concatenated and the larger row total wins.
    /// Lists are not merged; the receiver keeps its own rows.
    pub fn merge(&mut self, other: Response<M>) {
        self.errors.extend(other.errors);
        self.total_rows = self.total_rows.max(other.total_rows);
    }
}

impl<M> From<RepoResponse<M>> for Response<M> {
    fn from(repo: RepoResponse<M>) -> Self {
        Self {
            total_rows: repo.total_rows,
            total_pages: repo.total_pages,
            page_size: repo.page_size,
            current_page: repo.current_page,
            list: repo.list,
            errors: repo.errors,
        }
    }
}
