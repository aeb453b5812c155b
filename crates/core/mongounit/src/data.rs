//! Filling and resetting the active database.
//!
//! These operations work on any [`DocumentStore`]. The default reset is
//! total: every collection except `system.*` is dropped, so isolation does not
//! depend on a test naming what it wrote.

use crate::store::{Document, DocumentStore, StoreError};

/// Collections starting with this prefix belong to the server and survive
/// [`clear_data`].
pub const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// Inserts `documents` into `collection` in the given order.
///
/// An empty document list performs no insert, so the collection is not
/// created.
pub async fn fill_data<S>(
    store: &S,
    collection: &str,
    documents: Vec<Document>,
) -> Result<(), StoreError>
where
    S: DocumentStore + ?Sized,
{
    if documents.is_empty() {
        tracing::debug!(collection, "No documents to insert");
        return Ok(());
    }

    let count = documents.len();
    store.insert_many(collection, documents).await?;
    tracing::debug!(collection, count, "Inserted documents");
    Ok(())
}

/// Drops every collection whose name does not start with
/// [`SYSTEM_COLLECTION_PREFIX`] and returns the dropped names.
///
/// Stops at the first failing drop.
pub async fn clear_data<S>(store: &S) -> Result<Vec<String>, ResetError>
where
    S: DocumentStore + ?Sized,
{
    let names = store
        .list_collection_names()
        .await
        .map_err(|source| ResetError::ListCollections {
            database: store.database().to_string(),
            source,
        })?;

    let dropped: Vec<String> = names
        .into_iter()
        .filter(|name| !name.starts_with(SYSTEM_COLLECTION_PREFIX))
        .collect();

    for name in &dropped {
        drop_one(store, name).await?;
    }

    tracing::debug!(
        database = store.database(),
        dropped = dropped.len(),
        "Cleared database"
    );
    Ok(dropped)
}

/// Drops exactly the named collections, `system.*` included.
///
/// Skips enumeration, so it costs one round-trip per name.
pub async fn clear_collections<S, I>(store: &S, collections: I) -> Result<(), ResetError>
where
    S: DocumentStore + ?Sized,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    for name in collections {
        drop_one(store, name.as_ref()).await?;
    }
    Ok(())
}

async fn drop_one<S>(store: &S, collection: &str) -> Result<(), ResetError>
where
    S: DocumentStore + ?Sized,
{
    store
        .drop_collection(collection)
        .await
        .map_err(|source| ResetError::Drop {
            collection: collection.to_string(),
            source,
        })?;
    tracing::trace!(collection, "Dropped collection");
    Ok(())
}

/// Errors raised while resetting the database.
#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    /// The collections of the database could not be enumerated
    #[error("Cannot list collections of database '{database}'")]
    ListCollections {
        database: String,
        #[source]
        source: StoreError,
    },

    /// A collection could not be dropped
    #[error("Cannot drop collection '{collection}'")]
    Drop {
        collection: String,
        #[source]
        source: StoreError,
    },
}
