//! Database client capabilities used by the harness.
//!
//! The harness never talks to a driver directly. Inserting fixtures and
//! resetting the database only need the four operations on
//! [`DocumentStore`] and [`Connector`], which keeps the loader and the test
//! hook usable against [`MemoryStore`](crate::MemoryStore) in unit tests.

use std::sync::Arc;

use async_trait::async_trait;

/// Boxed error used for opaque driver failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A document as read from a fixture file: field names mapped to JSON values,
/// in the order they appear in the file.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A client handle bound to one database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the database this handle operates on.
    fn database(&self) -> &str;

    /// Inserts `documents` into `collection`, preserving their order.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<(), StoreError>;

    /// Lists the names of all collections in the database, including
    /// `system.*` collections.
    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError>;

    /// Drops `collection`. Dropping a collection that does not exist succeeds.
    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError>;
}

/// Factory producing a [`DocumentStore`] bound to a running server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to the server on the loopback `port` and binds the handle to
    /// `database`.
    async fn connect(
        &self,
        port: u16,
        database: &str,
    ) -> Result<Box<dyn DocumentStore>, StoreError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Box<T> {
    fn database(&self) -> &str {
        (**self).database()
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<(), StoreError> {
        (**self).insert_many(collection, documents).await
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_collection_names().await
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        (**self).drop_collection(collection).await
    }
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn database(&self) -> &str {
        (**self).database()
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<(), StoreError> {
        (**self).insert_many(collection, documents).await
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_collection_names().await
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        (**self).drop_collection(collection).await
    }
}

/// Errors returned by [`DocumentStore`] and [`Connector`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The client could not connect to the server
    #[error("Cannot connect to '{url}'")]
    Connect {
        url: String,
        #[source]
        source: BoxError,
    },

    /// A document could not be converted to the driver's representation
    #[error("Document {index} for collection '{collection}' cannot be converted")]
    InvalidDocument {
        collection: String,
        index: usize,
        #[source]
        source: BoxError,
    },

    /// Inserting documents failed
    #[error("Cannot insert documents into collection '{collection}'")]
    Insert {
        collection: String,
        #[source]
        source: BoxError,
    },

    /// Enumerating collections failed
    #[error("Cannot list collections of database '{database}'")]
    ListCollections {
        database: String,
        #[source]
        source: BoxError,
    },

    /// Dropping a collection failed
    #[error("Cannot drop collection '{collection}'")]
    Drop {
        collection: String,
        #[source]
        source: BoxError,
    },
}
