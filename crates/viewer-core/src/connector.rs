use std::fmt;
use std::path::PathBuf;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::http_client::{ChromaHttpClient, DEFAULT_DATABASE, DEFAULT_TENANT};
use crate::local_store::LocalStore;
use crate::store::VectorStore;
use crate::types::{Collection, GetResult, QueryParams, QueryResult};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;

/// Where the store lives. A local path wins over host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Remote {
        host: String,
        port: u16,
        tenant: String,
        database: String,
    },
    Local {
        path: PathBuf,
    },
}

impl ConnectionTarget {
    pub fn from_args(host: &str, port: u16, path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => ConnectionTarget::Local { path },
            None => ConnectionTarget::Remote {
                host: host.to_string(),
                port,
                tenant: DEFAULT_TENANT.to_string(),
                database: DEFAULT_DATABASE.to_string(),
            },
        }
    }

    /// Overrides tenant and database of a remote target.
    pub fn with_namespace(self, tenant: &str, database: &str) -> Self {
        match self {
            ConnectionTarget::Remote { host, port, .. } => ConnectionTarget::Remote {
                host,
                port,
                tenant: tenant.to_string(),
                database: database.to_string(),
            },
            local => local,
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Remote { host, port, .. } => {
                write!(f, "ChromaDB Server: {}:{}", host, port)
            }
            ConnectionTarget::Local { path } => write!(f, "DB Path: {}", path.display()),
        }
    }
}

/// Either store, behind one [`VectorStore`] implementation.
pub enum Connector<E> {
    Remote(ChromaHttpClient<E>),
    Local(LocalStore<E>),
}

impl<E: Embedder> Connector<E> {
    pub async fn connect(target: &ConnectionTarget, embedder: E) -> Result<Self> {
        match target {
            ConnectionTarget::Remote {
                host,
                port,
                tenant,
                database,
            } => {
                tracing::info!("Connecting to ChromaDB server: {}:{}", host, port);
                ChromaHttpClient::connect(host, *port, tenant, database, embedder)
                    .await
                    .map(Connector::Remote)
            }
            ConnectionTarget::Local { path } => {
                tracing::info!("Opening local database: {}", path.display());
                LocalStore::open(path, embedder).map(Connector::Local)
            }
        }
    }
}

impl<E: Embedder> VectorStore for Connector<E> {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        match self {
            Connector::Remote(c) => c.list_collections().await,
            Connector::Local(c) => c.list_collections().await,
        }
    }

    async fn get_all(&self, collection: &Collection) -> Result<GetResult> {
        match self {
            Connector::Remote(c) => c.get_all(collection).await,
            Connector::Local(c) => c.get_all(collection).await,
        }
    }

    async fn get_page(
        &self,
        collection: &Collection,
        limit: usize,
        offset: usize,
    ) -> Result<GetResult> {
        match self {
            Connector::Remote(c) => c.get_page(collection, limit, offset).await,
            Connector::Local(c) => c.get_page(collection, limit, offset).await,
        }
    }

    async fn query(&self, collection: &Collection, params: &QueryParams) -> Result<QueryResult> {
        match self {
            Connector::Remote(c) => c.query(collection, params).await,
            Connector::Local(c) => c.query(collection, params).await,
        }
    }
}
