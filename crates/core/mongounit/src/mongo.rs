//! [`DocumentStore`] backed by the official MongoDB driver.

use async_trait::async_trait;
use mongodb::{
    Client, Database,
    bson::{self, doc},
};

use crate::store::{Connector, Document, DocumentStore, StoreError};

/// A handle to one database of a MongoDB server.
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Binds a store to `database` on an existing client.
    pub fn new(client: &Client, database: &str) -> Self {
        Self {
            database: client.database(database),
        }
    }

    /// The underlying driver handle, for reading data back in tests.
    pub fn inner(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn database(&self) -> &str {
        self.database.name()
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<(), StoreError> {
        // Extended JSON forms such as {"$oid": ...} become their BSON types
        let documents = documents
            .into_iter()
            .enumerate()
            .map(|(index, document)| {
                bson::Document::try_from(document).map_err(|err| StoreError::InvalidDocument {
                    collection: collection.to_string(),
                    index,
                    source: err.into(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.database
            .collection::<bson::Document>(collection)
            .insert_many(documents)
            .await
            .map_err(|err| StoreError::Insert {
                collection: collection.to_string(),
                source: err.into(),
            })?;
        Ok(())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        self.database
            .list_collection_names()
            .await
            .map_err(|err| StoreError::ListCollections {
                database: self.database.name().to_string(),
                source: err.into(),
            })
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.database
            .collection::<bson::Document>(collection)
            .drop()
            .await
            .map_err(|err| StoreError::Drop {
                collection: collection.to_string(),
                source: err.into(),
            })
    }
}

/// [`Connector`] opening a driver [`Client`] against the embedded server.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(
        &self,
        port: u16,
        database: &str,
    ) -> Result<Box<dyn DocumentStore>, StoreError> {
        let url = embedded_mongod::connection_url(port);

        let client = Client::with_uri_str(&url)
            .await
            .map_err(|err| StoreError::Connect {
                url: url.clone(),
                source: err.into(),
            })?;

        // The driver connects lazily, so ping to surface failures at startup
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| StoreError::Connect {
                url: url.clone(),
                source: err.into(),
            })?;

        tracing::debug!(%url, database, "Connected to mongod");
        Ok(Box::new(MongoStore::new(&client, database)))
    }
}
