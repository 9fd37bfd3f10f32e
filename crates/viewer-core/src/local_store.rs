//! Read-only access to a persistent Chroma directory.
//!
//! A persistent directory keeps its catalog in `chroma.sqlite3`: the
//! collections, the rows of each collection's metadata segment, their
//! metadata (the document text lives under the `chroma:document` key) and
//! the write-ahead queue, which still holds the submitted vectors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde_json::{Number, Value};
use tokio::sync::Mutex;

use crate::embedding::Embedder;
use crate::error::{Result, ViewerError};
use crate::filter::{DocumentFilter, WhereFilter};
use crate::store::VectorStore;
use crate::types::{Collection, GetResult, Metadata, QueryParams, QueryResult};

pub const DB_FILE_NAME: &str = "chroma.sqlite3";
const DOCUMENT_KEY: &str = "chroma:document";
const RESERVED_KEY_PREFIX: &str = "chroma:";
const DELETE_OPERATION: i64 = 3;

/// Distance function configured for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceSpace {
    /// Squared euclidean distance.
    #[default]
    L2,
    Cosine,
    InnerProduct,
}

impl DistanceSpace {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "l2" => Some(DistanceSpace::L2),
            "cosine" => Some(DistanceSpace::Cosine),
            "ip" => Some(DistanceSpace::InnerProduct),
            _ => None,
        }
    }

    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        match self {
            DistanceSpace::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            DistanceSpace::InnerProduct => 1.0 - dot,
            DistanceSpace::Cosine => {
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
        }
    }
}

struct StoredItem {
    id: String,
    document: Option<String>,
    metadata: Option<Metadata>,
    vector: Option<Vec<f32>>,
}

pub struct LocalStore<E> {
    // Wrap connection for async access
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    embedder: E,
}

impl<E: Embedder> LocalStore<E> {
    pub fn open(path: &Path, embedder: E) -> Result<Self> {
        let db_file = path.join(DB_FILE_NAME);
        if !db_file.is_file() {
            return Err(ViewerError::Connection(format!(
                "Failed to open ChromaDB at path {}: {} not found",
                path.display(),
                DB_FILE_NAME
            )));
        }
        let conn = Connection::open_with_flags(&db_file, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM collections", [], |row| {
                    row.get::<_, i64>(0)
                })?;
                Ok(conn)
            })
            .map_err(|e| {
                ViewerError::Connection(format!(
                    "Failed to open ChromaDB at path {}: {}",
                    path.display(),
                    e
                ))
            })?;
        tracing::info!("Opened local database: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
            embedder,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_items(
        &self,
        collection: &Collection,
        limit: Option<usize>,
        offset: usize,
        with_vectors: bool,
    ) -> Result<Vec<StoredItem>> {
        let conn = self.conn.lock().await;
        let limit = match limit {
            Some(l) => i64::try_from(l)
                .map_err(|_| ViewerError::Query(format!("page size {l} is too large")))?,
            None => -1,
        };
        let offset = i64::try_from(offset)
            .map_err(|_| ViewerError::Query(format!("offset {offset} is past the end of any store")))?;

        let mut rows = conn.prepare(
            "SELECT e.id, e.embedding_id FROM embeddings e
             JOIN segments s ON e.segment_id = s.id
             WHERE s.collection = ?1 AND s.scope = 'METADATA'
             ORDER BY e.id LIMIT ?2 OFFSET ?3",
        )?;
        let keys = rows
            .query_map(params![collection.id, limit, offset], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(keys.len());
        for (row_id, id) in keys {
            let (document, metadata) = read_metadata(&conn, row_id)?;
            let vector = if with_vectors {
                read_vector(&conn, &collection.id, &id)?
            } else {
                None
            };
            items.push(StoredItem {
                id,
                document,
                metadata,
                vector,
            });
        }
        Ok(items)
    }
}

/// `hnsw:space` metadata wins; newer directories only record the space in
/// the collection's configuration JSON.
fn configured_space(collection: &Collection, config_json: Option<&str>) -> Result<DistanceSpace> {
    let from_config = config_json
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|config| {
            ["/hnsw/space", "/hnsw_configuration/space"]
                .iter()
                .find_map(|pointer| config.pointer(pointer).and_then(Value::as_str).map(str::to_string))
        });
    let configured = collection
        .metadata
        .as_ref()
        .and_then(|m| m.get("hnsw:space"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(from_config);
    match configured.as_deref() {
        None => Ok(DistanceSpace::default()),
        Some(name) => DistanceSpace::from_name(name)
            .ok_or_else(|| ViewerError::Query(format!("unsupported distance space '{}'", name))),
    }
}

fn read_metadata(conn: &Connection, row_id: i64) -> Result<(Option<String>, Option<Metadata>)> {
    let mut stmt = conn.prepare_cached(
        "SELECT key, string_value, int_value, float_value, bool_value
         FROM embedding_metadata WHERE id = ?1 ORDER BY key",
    )?;
    let entries = stmt
        .query_map(params![row_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                typed_value(
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ),
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut document = None;
    let mut metadata = Metadata::new();
    for (key, value) in entries {
        if key == DOCUMENT_KEY {
            document = value.as_str().map(str::to_string);
        } else if !key.starts_with(RESERVED_KEY_PREFIX) {
            metadata.insert(key, value);
        }
    }
    Ok((document, (!metadata.is_empty()).then_some(metadata)))
}

fn typed_value(
    string_value: Option<String>,
    int_value: Option<i64>,
    float_value: Option<f64>,
    bool_value: Option<i64>,
) -> Value {
    if let Some(s) = string_value {
        Value::String(s)
    } else if let Some(i) = int_value {
        Value::Number(i.into())
    } else if let Some(n) = float_value.and_then(Number::from_f64) {
        Value::Number(n)
    } else if let Some(b) = bool_value {
        Value::Bool(b != 0)
    } else {
        Value::Null
    }
}

/// Latest queued vector for `id`; `None` once the queue has been purged.
fn read_vector(conn: &Connection, collection_id: &str, id: &str) -> Result<Option<Vec<f32>>> {
    let mut stmt = conn.prepare_cached(
        "SELECT vector, encoding FROM embeddings_queue
         WHERE id = ?1 AND topic LIKE '%' || ?2 AND operation != ?3 AND vector IS NOT NULL
         ORDER BY seq_id DESC LIMIT 1",
    )?;
    let row = stmt
        .query_row(params![id, collection_id, DELETE_OPERATION], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .optional()?;

    Ok(row.and_then(|(blob, encoding)| {
        let float32 = encoding.as_deref().is_none_or(|e| e.eq_ignore_ascii_case("float32"));
        (float32 && blob.len() % 4 == 0).then(|| decode_f32(&blob))
    }))
}

fn decode_f32(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// The collection's configuration JSON, if this schema version stores one.
fn read_collection_config(conn: &Connection, collection_id: &str) -> Result<Option<String>> {
    let has_column: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('collections') WHERE name = 'config_json_str'",
        [],
        |row| row.get(0),
    )?;
    if !has_column {
        return Ok(None);
    }
    let config = conn
        .query_row(
            "SELECT config_json_str FROM collections WHERE id = ?1",
            params![collection_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(config.flatten())
}

fn read_collection_metadata(conn: &Connection, collection_id: &str) -> Result<Option<Metadata>> {
    let mut stmt = conn.prepare_cached(
        "SELECT key, str_value, int_value, float_value, bool_value
         FROM collection_metadata WHERE collection_id = ?1",
    )?;
    let metadata = stmt
        .query_map(params![collection_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                typed_value(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?),
            ))
        })?
        .collect::<std::result::Result<Metadata, _>>()?;
    Ok((!metadata.is_empty()).then_some(metadata))
}

fn passes(
    item: &StoredItem,
    where_filter: Option<&WhereFilter>,
    where_document: Option<&DocumentFilter>,
) -> bool {
    where_filter.is_none_or(|f| f.matches(item.metadata.as_ref()))
        && where_document.is_none_or(|f| f.matches(item.document.as_deref()))
}

impl<E: Embedder> VectorStore for LocalStore<E> {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name,
                (SELECT COUNT(*) FROM embeddings e
                 JOIN segments s ON e.segment_id = s.id
                 WHERE s.collection = c.id AND s.scope = 'METADATA')
             FROM collections c ORDER BY c.name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut collections = Vec::with_capacity(rows.len());
        for (id, name, count) in rows {
            let metadata = read_collection_metadata(&conn, &id)?;
            collections.push(Collection {
                id,
                name,
                count: Some(count.max(0) as usize),
                metadata,
            });
        }
        Ok(collections)
    }

    async fn get_all(&self, collection: &Collection) -> Result<GetResult> {
        let items = self.load_items(collection, None, 0, true).await?;
        let embeddings = if items.iter().any(|i| i.vector.is_some()) {
            Some(items.iter().map(|i| i.vector.clone()).collect())
        } else {
            None
        };
        Ok(GetResult {
            ids: Some(items.iter().map(|i| i.id.clone()).collect()),
            documents: Some(items.iter().map(|i| i.document.clone()).collect()),
            metadatas: Some(items.iter().map(|i| i.metadata.clone()).collect()),
            embeddings,
        })
    }

    async fn get_page(
        &self,
        collection: &Collection,
        limit: usize,
        offset: usize,
    ) -> Result<GetResult> {
        let items = self
            .load_items(collection, Some(limit), offset, false)
            .await?;
        Ok(GetResult {
            ids: Some(items.iter().map(|i| i.id.clone()).collect()),
            documents: Some(items.iter().map(|i| i.document.clone()).collect()),
            metadatas: Some(items.into_iter().map(|i| i.metadata).collect()),
            embeddings: None,
        })
    }

    async fn query(&self, collection: &Collection, params: &QueryParams) -> Result<QueryResult> {
        let config = {
            let conn = self.conn.lock().await;
            read_collection_config(&conn, &collection.id)?
        };
        let space = configured_space(collection, config.as_deref())?;
        let items = self.load_items(collection, None, 0, true).await?;
        if !items.is_empty() && items.iter().all(|i| i.vector.is_none()) {
            return Err(ViewerError::Query(format!(
                "collection '{}' has no stored vectors to search",
                collection.name
            )));
        }
        let candidates: Vec<&StoredItem> = items
            .iter()
            .filter(|i| i.vector.is_some())
            .filter(|i| passes(i, params.where_filter.as_ref(), params.where_document.as_ref()))
            .collect();

        let mut result = QueryResult {
            ids: Some(Vec::new()),
            documents: Some(Vec::new()),
            metadatas: Some(Vec::new()),
            distances: Some(Vec::new()),
        };
        for text in &params.query_texts {
            let query = self.embedder.embed(text).await?;
            let mut scored = Vec::with_capacity(candidates.len());
            for item in &candidates {
                let Some(vector) = item.vector.as_deref() else {
                    continue;
                };
                if vector.len() != query.len() {
                    return Err(ViewerError::Query(format!(
                        "query embedding has dimension {} but collection '{}' stores dimension {}",
                        query.len(),
                        collection.name,
                        vector.len()
                    )));
                }
                scored.push((space.distance(&query, vector), *item));
            }
            scored.sort_by(|a, b| a.0.total_cmp(&b.0));
            scored.truncate(params.n_results);

            if let Some(ids) = result.ids.as_mut() {
                ids.push(scored.iter().map(|(_, i)| i.id.clone()).collect());
            }
            if let Some(documents) = result.documents.as_mut() {
                documents.push(scored.iter().map(|(_, i)| i.document.clone()).collect());
            }
            if let Some(metadatas) = result.metadatas.as_mut() {
                metadatas.push(scored.iter().map(|(_, i)| i.metadata.clone()).collect());
            }
            if let Some(distances) = result.distances.as_mut() {
                distances.push(scored.iter().map(|(d, _)| Some(*d)).collect());
            }
        }
        Ok(result)
    }
}
