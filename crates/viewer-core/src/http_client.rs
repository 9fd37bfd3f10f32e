use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::embedding::Embedder;
use crate::error::{Result, ViewerError};
use crate::store::VectorStore;
use crate::types::{Collection, GetResult, Metadata, QueryParams, QueryResult};

pub const DEFAULT_TENANT: &str = "default_tenant";
pub const DEFAULT_DATABASE: &str = "default_database";

#[derive(Deserialize, Debug)]
struct CollectionModel {
    id: String,
    name: String,
    #[serde(default)]
    metadata: Option<Metadata>,
}

/// Client for a Chroma server's v2 REST API.
pub struct ChromaHttpClient<E> {
    client: Client,
    base_url: String,
    tenant: String,
    database: String,
    embedder: E,
}

impl<E: Embedder> ChromaHttpClient<E> {
    /// Connects and checks the server answers its heartbeat.
    pub async fn connect(
        host: &str,
        port: u16,
        tenant: &str,
        database: &str,
        embedder: E,
    ) -> Result<Self> {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host.trim_end_matches('/'), port)
        } else {
            format!("http://{}:{}", host, port)
        };
        let client = Self {
            client: Client::new(),
            base_url,
            tenant: tenant.to_string(),
            database: database.to_string(),
            embedder,
        };

        let heartbeat = client
            .client
            .get(format!("{}/api/v2/heartbeat", client.base_url))
            .send()
            .await
            .map_err(|e| ViewerError::Connection(e.to_string()))?;
        if !heartbeat.status().is_success() {
            return Err(ViewerError::Connection(format!(
                "heartbeat answered with {}",
                heartbeat.status()
            )));
        }
        tracing::info!("Connected to ChromaDB server at {}", client.base_url);
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ViewerError::Query(format!(
                "Chroma API request failed ({}): {}",
                status, error_text
            )));
        }
        Ok(response.json::<T>().await?)
    }

    async fn post_json<T: DeserializeOwned>(&self, url: String, body: &Value) -> Result<T> {
        tracing::debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn count(&self, collection_id: &str) -> Result<usize> {
        let url = format!("{}/{}/count", self.collections_url(), collection_id);
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }
}

impl<E: Embedder> VectorStore for ChromaHttpClient<E> {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let response = self.client.get(self.collections_url()).send().await?;
        let models: Vec<CollectionModel> = Self::read_json(response).await?;

        let mut collections = Vec::with_capacity(models.len());
        for model in models {
            let count = match self.count(&model.id).await {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::warn!(collection = %model.name, "Could not count collection: {}", e);
                    None
                }
            };
            collections.push(Collection {
                id: model.id,
                name: model.name,
                count,
                metadata: model.metadata,
            });
        }
        Ok(collections)
    }

    async fn get_all(&self, collection: &Collection) -> Result<GetResult> {
        let url = format!("{}/{}/get", self.collections_url(), collection.id);
        self.post_json(
            url,
            &json!({ "include": ["documents", "metadatas", "embeddings"] }),
        )
        .await
    }

    async fn get_page(
        &self,
        collection: &Collection,
        limit: usize,
        offset: usize,
    ) -> Result<GetResult> {
        let url = format!("{}/{}/get", self.collections_url(), collection.id);
        self.post_json(
            url,
            &json!({
                "include": ["documents", "metadatas"],
                "limit": limit,
                "offset": offset
            }),
        )
        .await
    }

    async fn query(&self, collection: &Collection, params: &QueryParams) -> Result<QueryResult> {
        let mut query_embeddings = Vec::with_capacity(params.query_texts.len());
        for text in &params.query_texts {
            query_embeddings.push(self.embedder.embed(text).await?);
        }

        let mut body = json!({
            "query_embeddings": query_embeddings,
            "n_results": params.n_results,
            "include": ["documents", "metadatas", "distances"]
        });
        if let Some(filter) = &params.where_filter {
            body["where"] = filter.to_json();
        }
        if let Some(filter) = &params.where_document {
            body["where_document"] = filter.to_json();
        }

        let url = format!("{}/{}/query", self.collections_url(), collection.id);
        self.post_json(url, &body).await
    }
}
