use std::fmt;

use crate::error::{Result, ViewerError};
use crate::filter::{DocumentFilter, WhereFilter};
use crate::reconcile::{Cell, Table};
use crate::store::VectorStore;
use crate::types::{Collection, QueryParams};

pub const DEFAULT_QUERY_RESULTS: usize = 5;
pub const MAX_QUERY_RESULTS: usize = 50;

/// What the user asked for, filters still in their raw text form.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub text: String,
    pub n_results: usize,
    pub include_distances: bool,
    pub where_filter: String,
    pub where_document: String,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            n_results: DEFAULT_QUERY_RESULTS,
            include_distances: true,
            where_filter: String::new(),
            where_document: String::new(),
        }
    }
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Requested count bounded to `1..=50`, then to what the collection holds.
    pub fn effective_n_results(&self, available: usize) -> usize {
        self.n_results.clamp(1, MAX_QUERY_RESULTS).min(available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceStats {
    pub best: f32,
    pub mean: f32,
}

impl DistanceStats {
    pub fn from_distances(distances: &[Option<f32>]) -> Option<Self> {
        let present: Vec<f32> = distances.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }
        let best = present.iter().copied().fold(f32::INFINITY, f32::min);
        let mean = present.iter().sum::<f32>() / present.len() as f32;
        Some(Self { best, mean })
    }
}

impl fmt::Display for DistanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Best match distance: {:.4}\nAverage distance: {:.4}",
            self.best, self.mean
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// No search text, so nothing was sent to the store.
    Skipped,
    NoResults,
    Results {
        table: Table,
        stats: Option<DistanceStats>,
    },
}

/// Outcome plus the filters that had to be dropped on the way.
#[derive(Debug)]
pub struct QueryReport {
    pub n_results: usize,
    pub warnings: Vec<ViewerError>,
    pub outcome: QueryOutcome,
}

/// Parses both raw filters. A filter that fails to parse is reported and
/// left out; it never prevents the query from running.
pub fn parse_filters(
    request: &QueryRequest,
) -> (Option<WhereFilter>, Option<DocumentFilter>, Vec<ViewerError>) {
    let mut warnings = Vec::new();

    let where_filter = match request.where_filter.trim() {
        "" => None,
        raw => WhereFilter::parse(raw)
            .inspect_err(|e| tracing::warn!("Ignoring metadata filter: {}", e))
            .map_err(|e| warnings.push(e))
            .ok(),
    };
    let where_document = match request.where_document.trim() {
        "" => None,
        raw => DocumentFilter::parse(raw)
            .inspect_err(|e| tracing::warn!("Ignoring document filter: {}", e))
            .map_err(|e| warnings.push(e))
            .ok(),
    };

    (where_filter, where_document, warnings)
}

pub async fn execute_query<S: VectorStore>(
    store: &S,
    collection: &Collection,
    request: &QueryRequest,
) -> Result<QueryReport> {
    let n_results =
        request.effective_n_results(collection.count.unwrap_or(MAX_QUERY_RESULTS));
    let (where_filter, where_document, warnings) = parse_filters(request);

    if request.text.is_empty() {
        return Ok(QueryReport {
            n_results,
            warnings,
            outcome: QueryOutcome::Skipped,
        });
    }
    if n_results == 0 {
        return Ok(QueryReport {
            n_results,
            warnings,
            outcome: QueryOutcome::NoResults,
        });
    }

    let params = QueryParams {
        query_texts: vec![request.text.clone()],
        n_results,
        where_filter,
        where_document,
    };
    tracing::info!(
        collection = %collection.name,
        n_results,
        "querying collection"
    );
    let batch = store.query(collection, &params).await?.first_batch();

    if batch.ids.is_empty() {
        return Ok(QueryReport {
            n_results,
            warnings,
            outcome: QueryOutcome::NoResults,
        });
    }

    let mut table = Table::new();
    table.push_column("ids", batch.ids.into_iter().map(Cell::Text).collect());
    if !batch.documents.is_empty() {
        table.push_column("documents", batch.documents.into_iter().map(Cell::from).collect());
    }
    if !batch.metadatas.is_empty() {
        table.push_column("metadatas", batch.metadatas.into_iter().map(Cell::from).collect());
    }

    let mut stats = None;
    if request.include_distances && !batch.distances.is_empty() {
        stats = DistanceStats::from_distances(&batch.distances);
        table.push_column(
            "distances",
            batch
                .distances
                .into_iter()
                .map(|d| d.map_or(Cell::Null, Cell::Distance))
                .collect(),
        );
    }

    Ok(QueryReport {
        n_results,
        warnings,
        outcome: QueryOutcome::Results { table, stats },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::FakeStore;
    use serde_json::json;

    fn store() -> FakeStore {
        FakeStore::with_collection(
            "notes",
            &[
                ("a", "rust borrow checker", json!({ "lang": "en" })),
                ("b", "tokio runtime", json!({ "lang": "en" })),
                ("c", "serde derive", json!({ "lang": "de" })),
            ],
        )
    }

    #[test]
    fn result_count_is_clamped_to_range_and_collection_size() {
        let mut request = QueryRequest::new("x");
        assert_eq!(request.effective_n_results(3), 3);
        request.n_results = 0;
        assert_eq!(request.effective_n_results(10), 1);
        request.n_results = 500;
        assert_eq!(request.effective_n_results(1000), MAX_QUERY_RESULTS);
        assert_eq!(request.effective_n_results(0), 0);
    }

    #[tokio::test]
    async fn clamps_requested_count_to_collection_size() {
        let store = store();
        let collection = store.collection("notes");
        let report = execute_query(&store, &collection, &QueryRequest::new("rust"))
            .await
            .unwrap();
        assert_eq!(report.n_results, 3);
        assert_eq!(store.last_query().unwrap().n_results, 3);
        match report.outcome {
            QueryOutcome::Results { table, stats } => {
                assert_eq!(
                    table.column_names(),
                    vec!["ids", "documents", "metadatas", "distances"]
                );
                assert_eq!(table.row_count(), 3);
                let stats = stats.unwrap();
                assert!(stats.best <= stats.mean);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_text_issues_no_query() {
        let store = store();
        let collection = store.collection("notes");
        let report = execute_query(&store, &collection, &QueryRequest::new(""))
            .await
            .unwrap();
        assert_eq!(report.outcome, QueryOutcome::Skipped);
        assert!(store.last_query().is_none());
    }

    #[tokio::test]
    async fn whitespace_text_is_still_sent() {
        let store = store();
        let collection = store.collection("notes");
        let report = execute_query(&store, &collection, &QueryRequest::new("  "))
            .await
            .unwrap();
        assert_ne!(report.outcome, QueryOutcome::Skipped);
        assert_eq!(store.last_query().unwrap().query_texts, vec!["  ".to_string()]);
    }

    #[tokio::test]
    async fn invalid_filter_warns_and_query_still_runs() {
        let store = store();
        let collection = store.collection("notes");
        let request = QueryRequest {
            where_filter: "{'lang': 'en'}".into(),
            where_document: r#"{"$contains": "tokio"}"#.into(),
            ..QueryRequest::new("runtime")
        };
        let report = execute_query(&store, &collection, &request).await.unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind(), ErrorKind::Parse);
        let sent = store.last_query().unwrap();
        assert!(sent.where_filter.is_none());
        assert_eq!(
            sent.where_document,
            Some(DocumentFilter::Contains("tokio".into()))
        );
        assert_eq!(sent.query_texts, vec!["runtime".to_string()]);
        assert!(matches!(report.outcome, QueryOutcome::Results { .. }));
    }

    #[tokio::test]
    async fn filtered_to_nothing_reports_no_results() {
        let store = store();
        let collection = store.collection("notes");
        let request = QueryRequest {
            where_filter: r#"{"lang": "fr"}"#.into(),
            ..QueryRequest::new("anything")
        };
        let report = execute_query(&store, &collection, &request).await.unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(report.outcome, QueryOutcome::NoResults);
    }

    #[tokio::test]
    async fn distances_can_be_left_out() {
        let store = store();
        let collection = store.collection("notes");
        let request = QueryRequest {
            include_distances: false,
            n_results: 2,
            ..QueryRequest::new("serde")
        };
        let report = execute_query(&store, &collection, &request).await.unwrap();
        match report.outcome {
            QueryOutcome::Results { table, stats } => {
                assert!(stats.is_none());
                assert!(table.column("distances").is_none());
                assert_eq!(table.row_count(), 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn stats_use_min_and_mean() {
        let stats =
            DistanceStats::from_distances(&[Some(0.5), None, Some(0.25), Some(0.75)]).unwrap();
        assert_eq!(stats.best, 0.25);
        assert_eq!(stats.mean, 0.5);
        assert_eq!(
            stats.to_string(),
            "Best match distance: 0.2500\nAverage distance: 0.5000"
        );
        assert!(DistanceStats::from_distances(&[None]).is_none());
    }
}
