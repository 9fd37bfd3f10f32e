use std::collections::HashMap;

use crate::browse::BrowseRequest;
use crate::query::QueryRequest;

/// Per-collection inputs: search text, filters and browse cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionState {
    pub query: QueryRequest,
    pub browse: BrowseRequest,
}

/// Inputs keyed by collection name, so working on one collection never
/// disturbs another.
#[derive(Debug, Default)]
pub struct SessionState {
    collections: HashMap<String, CollectionState>,
    current: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str) -> Option<&CollectionState> {
        self.collections.get(collection)
    }

    /// State for `collection`, created with defaults on first access.
    pub fn entry(&mut self, collection: &str) -> &mut CollectionState {
        self.collections.entry(collection.to_string()).or_default()
    }

    pub fn select(&mut self, collection: &str) {
        self.entry(collection);
        self.current = Some(collection.to_string());
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_state(&mut self) -> Option<(&str, &mut CollectionState)> {
        let name = self.current.as_deref()?;
        let state = self.collections.get_mut(name)?;
        Some((name, state))
    }

    /// Moves the browse cursor of `collection` one page forward.
    pub fn next_page(&mut self, collection: &str) -> BrowseRequest {
        let state = self.entry(collection);
        state.browse = state.browse.next_page();
        state.browse
    }
}
