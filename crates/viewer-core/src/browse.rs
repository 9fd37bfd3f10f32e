use std::fmt;

use crate::error::Result;
use crate::reconcile::{Cell, Table};
use crate::store::VectorStore;
use crate::types::Collection;

pub const DEFAULT_BROWSE_LIMIT: usize = 10;
pub const MAX_BROWSE_LIMIT: usize = 100;
/// Highest offset a store can be asked for (SQLite offsets are `i64`).
pub const MAX_BROWSE_OFFSET: usize = i64::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowseRequest {
    pub limit: usize,
    pub offset: usize,
}

impl Default for BrowseRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_BROWSE_LIMIT,
            offset: 0,
        }
    }
}

impl BrowseRequest {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_BROWSE_LIMIT)
    }

    /// The request for the page following this one.
    pub fn next_page(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self
                .offset
                .saturating_add(self.effective_limit())
                .min(MAX_BROWSE_OFFSET),
        }
    }
}

/// Half-open range of item positions a page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "items {} to {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowseOutcome {
    NoItems,
    Page { table: Table, range: PageRange },
}

pub async fn execute_browse<S: VectorStore>(
    store: &S,
    collection: &Collection,
    request: &BrowseRequest,
) -> Result<BrowseOutcome> {
    let limit = request.effective_limit();
    tracing::debug!(
        collection = %collection.name,
        limit,
        offset = request.offset,
        "browsing collection"
    );
    let page = store.get_page(collection, limit, request.offset).await?;

    let ids = match page.ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Ok(BrowseOutcome::NoItems),
    };
    let returned = ids.len();

    let mut table = Table::new();
    table.push_column("ids", ids.into_iter().map(Cell::Text).collect());
    if let Some(documents) = page.documents.filter(|d| !d.is_empty()) {
        table.push_column("documents", documents.into_iter().map(Cell::from).collect());
    }
    if let Some(metadatas) = page.metadatas.filter(|m| !m.is_empty()) {
        table.push_column("metadatas", metadatas.into_iter().map(Cell::from).collect());
    }

    Ok(BrowseOutcome::Page {
        table,
        range: PageRange {
            start: request.offset,
            end: request.offset.saturating_add(returned),
        },
    })
}
