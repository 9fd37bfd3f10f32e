//! Text rendering of listings, query results and browse pages.

use std::fmt::Write;

use tabled::builder::Builder;
use tabled::settings::Style;
use viewer_core::browse::BrowseOutcome;
use viewer_core::connector::ConnectionTarget;
use viewer_core::inspect::{CollectionView, Listing};
use viewer_core::query::{QueryOutcome, QueryReport};
use viewer_core::reconcile::{Table, TableOutcome};
use viewer_core::{ErrorKind, ViewerError};

/// Widest a document or metadata cell may get before it is cut.
const MAX_CELL_WIDTH: usize = 60;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

pub fn render_table(table: &Table) -> String {
    let mut builder = Builder::new();
    let header = table.column_names().into_iter().map(String::from);
    builder.push_record(std::iter::once(String::new()).chain(header));
    for (index, row) in table.rows().enumerate() {
        builder.push_record(
            std::iter::once(index.to_string())
                .chain(row.iter().map(|cell| truncate(&cell.to_string(), MAX_CELL_WIDTH))),
        );
    }
    let mut rendered = builder.build();
    rendered.with(Style::rounded());
    rendered.to_string()
}

pub fn render_connection_error(target: &ConnectionTarget, error: &ViewerError) -> String {
    let mut out = String::new();
    match target {
        ConnectionTarget::Remote { host, port, .. } => {
            let _ = writeln!(out, "error: Failed to connect to ChromaDB server at {host}:{port}");
            let _ = writeln!(out, "error: {error}");
            let _ = write!(
                out,
                "Make sure your ChromaDB Docker container is running and accessible"
            );
        }
        ConnectionTarget::Local { path } => {
            let _ = writeln!(out, "error: Failed to open ChromaDB at path: {}", path.display());
            let _ = write!(out, "error: {error}");
        }
    }
    out
}

fn render_collection(out: &mut String, view: &CollectionView) {
    let _ = writeln!(out, "### Collection: {}", view.collection.name);
    let contents = match &view.contents {
        Ok(contents) => contents,
        Err(e) => {
            let _ = writeln!(
                out,
                "error: Error processing collection '{}': {}",
                view.collection.name, e
            );
            return;
        }
    };
    let _ = writeln!(out, "Count: {} items", contents.item_count);
    let _ = writeln!(out, "Data lengths: {}", contents.lengths);
    match &contents.outcome {
        TableOutcome::Table(table) => {
            let _ = writeln!(out, "{}", render_table(table));
        }
        TableOutcome::Empty => {
            let _ = writeln!(out, "This collection is empty");
        }
        TableOutcome::Inconsistent => {
            let _ = writeln!(
                out,
                "warning: Could not create table due to inconsistent data lengths"
            );
        }
    }
}

pub fn render_listing(listing: &Listing) -> String {
    let mut out = String::from("## Collections\n");
    match listing {
        Listing::NoCollections => {
            out.push_str("No collections found in this ChromaDB instance\n");
        }
        Listing::Collections(views) => {
            for view in views {
                out.push('\n');
                render_collection(&mut out, view);
            }
        }
    }
    out
}

pub fn render_query(report: &QueryReport) -> String {
    let mut out = String::new();
    for warning in &report.warnings {
        let _ = writeln!(out, "warning: {warning}. Ignoring filter.");
    }
    match &report.outcome {
        QueryOutcome::Skipped => {
            let _ = writeln!(out, "Enter search text to query the collection");
        }
        QueryOutcome::NoResults => {
            let _ = writeln!(out, "##### Query Results:");
            let _ = writeln!(out, "No results found for your query");
        }
        QueryOutcome::Results { table, stats } => {
            let _ = writeln!(out, "##### Query Results:");
            let _ = writeln!(out, "{}", render_table(table));
            if let Some(stats) = stats {
                let _ = writeln!(out, "{stats}");
            }
        }
    }
    out
}

pub fn render_query_error(error: &ViewerError) -> String {
    let mut out = format!("error: Query failed: {error}");
    if error.kind() == ErrorKind::Query {
        out.push_str("\nMake sure the collection has embeddings and the query is valid");
    }
    out
}

pub fn render_browse(outcome: &BrowseOutcome) -> String {
    let mut out = String::from("##### Browse Results:\n");
    match outcome {
        BrowseOutcome::NoItems => {
            out.push_str("No items found in the specified range\n");
        }
        BrowseOutcome::Page { table, range } => {
            let _ = writeln!(out, "{}", render_table(table));
            let _ = writeln!(out, "Showing {range}");
        }
    }
    out
}

pub fn render_browse_error(error: &ViewerError) -> String {
    format!("error: Browse failed: {error}")
}
