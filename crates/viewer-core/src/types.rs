//! Records exchanged with a vector store.
//!
//! Field arrays mirror the store's wire shape: each one is independently
//! optional and nothing guarantees they share a length. The reconciler is
//! responsible for making sense of them.

use serde::{Deserialize, Serialize};

use crate::filter::{DocumentFilter, WhereFilter};

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A named partition of the store, as listed by a connector.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: String,
    pub name: String,
    /// `None` when the store could not count the collection.
    pub count: Option<usize>,
    pub metadata: Option<Metadata>,
}

/// Raw per-field arrays returned by a fetch. Browse pages never carry
/// embeddings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResult {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Option<Metadata>>>,
    #[serde(default)]
    pub embeddings: Option<Vec<Option<Vec<f32>>>>,
}

/// Similarity search response, batched by query text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub ids: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f32>>>>,
}

/// A single similarity search as handed to a store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub query_texts: Vec<String>,
    pub n_results: usize,
    pub where_filter: Option<WhereFilter>,
    pub where_document: Option<DocumentFilter>,
}

impl QueryResult {
    /// First batch element of every field. Only one query text is ever
    /// submitted, so later batches are ignored.
    pub fn first_batch(self) -> QueryBatch {
        fn first<T>(batches: Option<Vec<Vec<T>>>) -> Vec<T> {
            batches
                .and_then(|b| b.into_iter().next())
                .unwrap_or_default()
        }
        QueryBatch {
            ids: first(self.ids),
            documents: first(self.documents),
            metadatas: first(self.metadatas),
            distances: first(self.distances),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBatch {
    pub ids: Vec<String>,
    pub documents: Vec<Option<String>>,
    pub metadatas: Vec<Option<Metadata>>,
    pub distances: Vec<Option<f32>>,
}
