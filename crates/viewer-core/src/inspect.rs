use crate::error::{Result, ViewerError};
use crate::reconcile::{FieldLengths, TableOutcome, reconcile};
use crate::store::VectorStore;
use crate::types::Collection;

/// Everything shown for one collection in the listing.
#[derive(Debug)]
pub struct CollectionView {
    pub collection: Collection,
    /// Fetch-and-reconcile result. An error here only affects this
    /// collection.
    pub contents: Result<CollectionContents>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionContents {
    pub item_count: usize,
    pub lengths: FieldLengths,
    pub outcome: TableOutcome,
}

#[derive(Debug)]
pub enum Listing {
    NoCollections,
    Collections(Vec<CollectionView>),
}

pub async fn load_collection<S: VectorStore>(
    store: &S,
    collection: &Collection,
) -> Result<CollectionContents> {
    let data = store.get_all(collection).await?;
    let reconciled = reconcile(&data);
    Ok(CollectionContents {
        item_count: reconciled.lengths.ids,
        lengths: reconciled.lengths,
        outcome: reconciled.outcome,
    })
}

/// Lists the store and reconciles every collection in turn. Failing to
/// list is fatal; failing on one collection is recorded and the listing
/// moves on.
pub async fn inspect<S: VectorStore>(store: &S) -> Result<Listing> {
    let collections = store.list_collections().await?;
    tracing::info!("Found {} collections", collections.len());
    if collections.is_empty() {
        return Ok(Listing::NoCollections);
    }

    let mut views = Vec::with_capacity(collections.len());
    for collection in collections {
        let contents = load_collection(store, &collection).await;
        if let Err(e) = &contents {
            tracing::error!(collection = %collection.name, "Error processing collection: {}", e);
        }
        views.push(CollectionView {
            collection,
            contents,
        });
    }
    Ok(Listing::Collections(views))
}

/// Finds a collection by name among those the store lists.
pub async fn find_collection<S: VectorStore>(store: &S, name: &str) -> Result<Collection> {
    store
        .list_collections()
        .await?
        .into_iter()
        .find(|c| c.name == name)
        .ok_or_else(|| ViewerError::Query(format!("collection '{name}' does not exist")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::FakeStore;
    use serde_json::json;

    #[tokio::test]
    async fn empty_store_yields_no_collections() {
        let store = FakeStore::default();
        assert!(matches!(inspect(&store).await.unwrap(), Listing::NoCollections));
    }

    #[tokio::test]
    async fn one_broken_collection_does_not_abort_the_listing() {
        let mut store = FakeStore::with_collection("first", &[("a", "alpha", json!({}))]);
        store.add_collection("broken", &[("b", "beta", json!({}))]);
        store.add_collection("empty", &[]);
        store.break_collection("broken");

        let Listing::Collections(views) = inspect(&store).await.unwrap() else {
            panic!("expected collections");
        };
        assert_eq!(views.len(), 3);

        let first = views[0].contents.as_ref().unwrap();
        assert_eq!(first.item_count, 1);
        assert!(matches!(&first.outcome, TableOutcome::Table(t) if t.row_count() == 1));

        let err = views[1].contents.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);

        let empty = views[2].contents.as_ref().unwrap();
        assert_eq!(empty.outcome, TableOutcome::Empty);
    }

    #[tokio::test]
    async fn finds_collections_by_name() {
        let store = FakeStore::with_collection("notes", &[]);
        assert_eq!(find_collection(&store, "notes").await.unwrap().name, "notes");
        assert!(find_collection(&store, "missing").await.is_err());
    }
}
