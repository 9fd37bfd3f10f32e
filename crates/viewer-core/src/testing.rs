//! In-memory store for executor tests.

use std::sync::Mutex;

use serde_json::Value;

use crate::error::{Result, ViewerError};
use crate::store::VectorStore;
use crate::types::{Collection, GetResult, Metadata, QueryParams, QueryResult};

struct Item {
    id: String,
    document: String,
    metadata: Metadata,
}

#[derive(Default)]
pub(crate) struct FakeStore {
    collections: Vec<(Collection, Vec<Item>)>,
    broken: Vec<String>,
    ignores_offset: bool,
    last_query: Mutex<Option<QueryParams>>,
}

impl FakeStore {
    pub(crate) fn with_collection(name: &str, items: &[(&str, &str, Value)]) -> Self {
        let mut store = Self::default();
        store.add_collection(name, items);
        store
    }

    pub(crate) fn add_collection(&mut self, name: &str, items: &[(&str, &str, Value)]) {
        let items: Vec<Item> = items
            .iter()
            .map(|(id, document, metadata)| Item {
                id: id.to_string(),
                document: document.to_string(),
                metadata: metadata.as_object().cloned().unwrap_or_default(),
            })
            .collect();
        let collection = Collection {
            id: format!("{name}-id"),
            name: name.to_string(),
            count: Some(items.len()),
            metadata: None,
        };
        self.collections.push((collection, items));
    }

    /// Makes every fetch against `name` fail.
    pub(crate) fn break_collection(&mut self, name: &str) {
        self.broken.push(name.to_string());
    }

    /// Serves every page from the first item, whatever the offset.
    pub(crate) fn ignore_offsets(&mut self) {
        self.ignores_offset = true;
    }

    pub(crate) fn collection(&self, name: &str) -> Collection {
        self.collections
            .iter()
            .find(|(c, _)| c.name == name)
            .map(|(c, _)| c.clone())
            .unwrap_or_else(|| panic!("no collection {name}"))
    }

    pub(crate) fn last_query(&self) -> Option<QueryParams> {
        self.last_query.lock().unwrap().clone()
    }

    fn items(&self, collection: &Collection) -> Result<&[Item]> {
        if self.broken.contains(&collection.name) {
            return Err(ViewerError::Query(format!(
                "collection {} is unreadable",
                collection.name
            )));
        }
        self.collections
            .iter()
            .find(|(c, _)| c.id == collection.id)
            .map(|(_, items)| items.as_slice())
            .ok_or_else(|| ViewerError::Query(format!("collection {} not found", collection.name)))
    }
}

impl VectorStore for FakeStore {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.collections.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn get_all(&self, collection: &Collection) -> Result<GetResult> {
        let items = self.items(collection)?;
        Ok(GetResult {
            ids: Some(items.iter().map(|i| i.id.clone()).collect()),
            documents: Some(items.iter().map(|i| Some(i.document.clone())).collect()),
            metadatas: Some(items.iter().map(|i| Some(i.metadata.clone())).collect()),
            embeddings: Some(items.iter().map(|_| Some(vec![0.0; 3])).collect()),
        })
    }

    async fn get_page(
        &self,
        collection: &Collection,
        limit: usize,
        offset: usize,
    ) -> Result<GetResult> {
        let skip = if self.ignores_offset { 0 } else { offset };
        let page: Vec<&Item> = self.items(collection)?.iter().skip(skip).take(limit).collect();
        Ok(GetResult {
            ids: Some(page.iter().map(|i| i.id.clone()).collect()),
            documents: Some(page.iter().map(|i| Some(i.document.clone())).collect()),
            metadatas: Some(page.iter().map(|i| Some(i.metadata.clone())).collect()),
            embeddings: None,
        })
    }

    /// Items whose document contains the query text rank first.
    async fn query(&self, collection: &Collection, params: &QueryParams) -> Result<QueryResult> {
        *self.last_query.lock().unwrap() = Some(params.clone());
        let text = params.query_texts.first().cloned().unwrap_or_default();
        let mut hits: Vec<(f32, &Item)> = self
            .items(collection)?
            .iter()
            .filter(|i| {
                params
                    .where_filter
                    .as_ref()
                    .is_none_or(|f| f.matches(Some(&i.metadata)))
            })
            .filter(|i| {
                params
                    .where_document
                    .as_ref()
                    .is_none_or(|f| f.matches(Some(i.document.as_str())))
            })
            .enumerate()
            .map(|(rank, i)| {
                let base = if i.document.contains(&text) { 0.0 } else { 1.0 };
                (base + rank as f32 * 0.125, i)
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.truncate(params.n_results);

        Ok(QueryResult {
            ids: Some(vec![hits.iter().map(|(_, i)| i.id.clone()).collect()]),
            documents: Some(vec![hits.iter().map(|(_, i)| Some(i.document.clone())).collect()]),
            metadatas: Some(vec![hits.iter().map(|(_, i)| Some(i.metadata.clone())).collect()]),
            distances: Some(vec![hits.iter().map(|(d, _)| Some(*d)).collect()]),
        })
    }
}
