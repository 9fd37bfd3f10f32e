//! Turns a collection's parallel field arrays into one displayable table.
//!
//! The store is supposed to return `ids`, `documents`, `metadatas` and
//! `embeddings` of equal length but does not guarantee it. A field is kept
//! only when its length equals the longest field; shorter fields are
//! dropped whole rather than padded or truncated, so every surviving row
//! stays aligned.

use std::fmt;

use serde_json::Value;

use crate::types::{GetResult, Metadata};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Json(Value),
    Count(usize),
    Distance(f32),
    Null,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Json(v) => write!(f, "{v}"),
            Cell::Count(n) => write!(f, "{n}"),
            Cell::Distance(d) => write!(f, "{d}"),
            Cell::Null => f.write_str("None"),
        }
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map_or(Cell::Null, Cell::Text)
    }
}

impl From<Option<Metadata>> for Cell {
    fn from(value: Option<Metadata>) -> Self {
        value.map_or(Cell::Null, |m| Cell::Json(Value::Object(m)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub cells: Vec<Cell>,
}

/// Column-major table. Every column holds the same number of cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. Callers must only push columns of the table's
    /// current row count; mismatched columns are refused.
    pub fn push_column(&mut self, name: &'static str, cells: Vec<Cell>) -> bool {
        if !self.columns.is_empty() && cells.len() != self.row_count() {
            return false;
        }
        self.columns.push(Column { name, cells });
        true
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        (0..self.row_count()).map(move |row| self.columns.iter().map(|c| &c.cells[row]).collect())
    }
}

/// Length of each raw field, with absent fields counted as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldLengths {
    pub ids: usize,
    pub documents: usize,
    pub metadatas: usize,
    pub embeddings: usize,
}

impl FieldLengths {
    pub fn of(result: &GetResult) -> Self {
        Self {
            ids: result.ids.as_ref().map_or(0, Vec::len),
            documents: result.documents.as_ref().map_or(0, Vec::len),
            metadatas: result.metadatas.as_ref().map_or(0, Vec::len),
            embeddings: result.embeddings.as_ref().map_or(0, Vec::len),
        }
    }

    pub fn max(&self) -> usize {
        self.ids
            .max(self.documents)
            .max(self.metadatas)
            .max(self.embeddings)
    }
}

impl fmt::Display for FieldLengths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ids: {}, embeddings: {}, metadatas: {}, documents: {}",
            self.ids, self.embeddings, self.metadatas, self.documents
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome {
    Table(Table),
    /// Every field is absent or empty.
    Empty,
    /// Data exists but no field reached the maximum length.
    Inconsistent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub lengths: FieldLengths,
    pub outcome: TableOutcome,
}

pub const EMBEDDINGS_COUNT: &str = "embeddings_count";

/// Builds the display table for a full collection fetch. Never fails:
/// inconsistent input degrades to one of the two stop outcomes.
pub fn reconcile(result: &GetResult) -> Reconciled {
    let lengths = FieldLengths::of(result);
    let max_length = lengths.max();
    if max_length == 0 {
        return Reconciled {
            lengths,
            outcome: TableOutcome::Empty,
        };
    }

    let full = |len: usize| len == max_length;
    let mut table = Table::new();

    if let Some(ids) = result.ids.as_ref().filter(|v| full(v.len())) {
        table.push_column("ids", ids.iter().cloned().map(Cell::Text).collect());
    }
    if let Some(documents) = result.documents.as_ref().filter(|v| full(v.len())) {
        table.push_column("documents", documents.iter().cloned().map(Cell::from).collect());
    }
    if let Some(metadatas) = result.metadatas.as_ref().filter(|v| full(v.len())) {
        table.push_column("metadatas", metadatas.iter().cloned().map(Cell::from).collect());
    }
    if let Some(embeddings) = result.embeddings.as_ref().filter(|v| full(v.len())) {
        table.push_column(
            EMBEDDINGS_COUNT,
            embeddings
                .iter()
                .map(|e| Cell::Count(e.as_ref().map_or(0, Vec::len)))
                .collect(),
        );
    }

    let outcome = if table.is_empty() {
        TableOutcome::Inconsistent
    } else {
        TableOutcome::Table(table)
    };
    Reconciled { lengths, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(n: usize) -> Option<Vec<String>> {
        Some((0..n).map(|i| format!("id{i}")).collect())
    }

    fn documents(n: usize) -> Option<Vec<Option<String>>> {
        Some((0..n).map(|i| Some(format!("doc {i}"))).collect())
    }

    fn metadatas(n: usize) -> Option<Vec<Option<Metadata>>> {
        Some(
            (0..n)
                .map(|i| json!({ "n": i }).as_object().cloned())
                .collect(),
        )
    }

    fn embeddings(n: usize, dim: usize) -> Option<Vec<Option<Vec<f32>>>> {
        Some((0..n).map(|_| Some(vec![0.5; dim])).collect())
    }

    fn table(reconciled: Reconciled) -> Table {
        match reconciled.outcome {
            TableOutcome::Table(t) => t,
            other => panic!("expected a table, got {other:?}"),
        }
    }

    #[test]
    fn equal_lengths_keep_every_field() {
        let result = GetResult {
            ids: ids(4),
            documents: documents(4),
            metadatas: metadatas(4),
            embeddings: embeddings(4, 384),
        };
        let t = table(reconcile(&result));
        assert_eq!(
            t.column_names(),
            vec!["ids", "documents", "metadatas", EMBEDDINGS_COUNT]
        );
        assert_eq!(t.row_count(), 4);
        assert!(
            t.column(EMBEDDINGS_COUNT)
                .unwrap()
                .cells
                .iter()
                .all(|c| *c == Cell::Count(384))
        );
    }

    #[test]
    fn shorter_fields_are_dropped_not_padded() {
        let result = GetResult {
            ids: ids(3),
            documents: documents(3),
            metadatas: metadatas(2),
            embeddings: None,
        };
        let reconciled = reconcile(&result);
        assert_eq!(
            reconciled.lengths,
            FieldLengths {
                ids: 3,
                documents: 3,
                metadatas: 2,
                embeddings: 0
            }
        );
        let t = table(reconciled);
        assert_eq!(t.column_names(), vec!["ids", "documents"]);
        assert_eq!(t.row_count(), 3);
    }

    #[test]
    fn all_absent_or_empty_is_an_empty_collection() {
        assert_eq!(reconcile(&GetResult::default()).outcome, TableOutcome::Empty);
        let result = GetResult {
            ids: Some(vec![]),
            documents: Some(vec![]),
            metadatas: None,
            embeddings: Some(vec![]),
        };
        assert_eq!(reconcile(&result).outcome, TableOutcome::Empty);
    }

    #[test]
    fn a_single_longest_field_still_builds_a_table() {
        let result = GetResult {
            ids: ids(1),
            documents: documents(2),
            metadatas: metadatas(1),
            embeddings: embeddings(1, 3),
        };
        let t = table(reconcile(&result));
        assert_eq!(t.column_names(), vec!["documents"]);
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn missing_embedding_entries_count_as_zero() {
        let result = GetResult {
            ids: ids(2),
            embeddings: Some(vec![Some(vec![1.0, 2.0]), None]),
            ..GetResult::default()
        };
        let t = table(reconcile(&result));
        assert_eq!(
            t.column(EMBEDDINGS_COUNT).unwrap().cells,
            vec![Cell::Count(2), Cell::Count(0)]
        );
    }

    #[test]
    fn never_panics_over_length_combinations() {
        let options = [None, Some(0), Some(1), Some(3)];
        for i in options {
            for d in options {
                for m in options {
                    for e in options {
                        let result = GetResult {
                            ids: i.and_then(ids),
                            documents: d.and_then(documents),
                            metadatas: m.and_then(metadatas),
                            embeddings: e.and_then(|n| embeddings(n, 2)),
                        };
                        let reconciled = reconcile(&result);
                        let max = reconciled.lengths.max();
                        match reconciled.outcome {
                            TableOutcome::Empty => assert_eq!(max, 0),
                            TableOutcome::Table(t) => {
                                assert_eq!(t.row_count(), max);
                                assert!(t.columns().iter().all(|c| c.cells.len() == max));
                            }
                            TableOutcome::Inconsistent => {
                                panic!("the longest field always survives")
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn table_refuses_misaligned_columns() {
        let mut t = Table::new();
        assert!(t.push_column("ids", vec![Cell::Text("a".into())]));
        assert!(!t.push_column("documents", vec![]));
        assert_eq!(t.column_names(), vec!["ids"]);
        let rows: Vec<_> = t.rows().collect();
        assert_eq!(rows, vec![vec![&Cell::Text("a".into())]]);
    }

    #[test]
    fn lengths_display_lists_every_field() {
        let lengths = FieldLengths {
            ids: 3,
            documents: 3,
            metadatas: 2,
            embeddings: 0,
        };
        assert_eq!(
            lengths.to_string(),
            "ids: 3, embeddings: 0, metadatas: 2, documents: 3"
        );
    }
}
