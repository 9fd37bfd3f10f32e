use crate::error::Result;
use crate::types::{Collection, GetResult, QueryParams, QueryResult};

/// Read-only access to a vector store, as needed by the viewer.
#[allow(async_fn_in_trait)]
pub trait VectorStore {
    async fn list_collections(&self) -> Result<Vec<Collection>>;

    /// Every item of the collection, embeddings included.
    async fn get_all(&self, collection: &Collection) -> Result<GetResult>;

    /// One page of ids, documents and metadatas, in store order.
    async fn get_page(
        &self,
        collection: &Collection,
        limit: usize,
        offset: usize,
    ) -> Result<GetResult>;

    async fn query(&self, collection: &Collection, params: &QueryParams) -> Result<QueryResult>;
}
