//! Lifecycle of the embedded server shared by a test suite.

use async_trait::async_trait;
use embedded_mongod::{MongodBuilder, MongodError, MongodProcess};

use crate::{
    config::MongodConfig,
    data::{self, ResetError},
    mongo::MongoConnector,
    store::{Connector, Document, DocumentStore, StoreError},
};

/// One running server together with the client bound to its database.
pub struct EmbeddedProcessHandle {
    port: u16,
    database: String,
    process: MongodProcess,
    client: Box<dyn DocumentStore>,
}

impl EmbeddedProcessHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn process(&self) -> &MongodProcess {
        &self.process
    }

    pub fn client(&self) -> &dyn DocumentStore {
        self.client.as_ref()
    }
}

impl std::fmt::Debug for EmbeddedProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedProcessHandle")
            .field("port", &self.port)
            .field("database", &self.database)
            .field("process", &self.process)
            .finish_non_exhaustive()
    }
}

/// Starts, tracks and stops the embedded `mongod` used by a test suite.
///
/// There is no global instance: whoever assembles the suite owns the manager
/// and passes it by reference to the [`FixtureHook`](crate::FixtureHook) and
/// [`FixtureLoader`](crate::FixtureLoader). Once started, the manager is
/// itself a [`DocumentStore`] on the active database.
///
/// # Panics
///
/// Calling [`start`](Self::start) on a started manager, or any data operation
/// on a stopped one, is a programming error and panics.
pub struct EmbeddedMongo<C = MongoConnector> {
    builder: MongodBuilder,
    connector: C,
    handle: Option<EmbeddedProcessHandle>,
}

impl EmbeddedMongo<MongoConnector> {
    /// A manager starting processes from `builder` and connecting with the
    /// MongoDB driver.
    pub fn new(builder: MongodBuilder) -> Self {
        Self::with_connector(builder, MongoConnector)
    }

    pub fn from_config(config: &MongodConfig) -> Self {
        Self::new(config.builder())
    }
}

impl Default for EmbeddedMongo<MongoConnector> {
    fn default() -> Self {
        Self::new(MongodBuilder::new())
    }
}

impl<C: Connector> EmbeddedMongo<C> {
    /// A manager connecting through a custom client factory.
    pub fn with_connector(builder: MongodBuilder, connector: C) -> Self {
        Self {
            builder,
            connector,
            handle: None,
        }
    }

    /// Launches `mongod` on the loopback `port` and binds a client to
    /// `database`.
    ///
    /// A `port` of `0` picks a free port; see [`EmbeddedProcessHandle::port`].
    /// If the client cannot connect, the process is stopped before the error
    /// is returned.
    ///
    /// # Panics
    ///
    /// If the manager is already started.
    pub async fn start(
        &mut self,
        port: u16,
        database: &str,
    ) -> Result<&EmbeddedProcessHandle, StartupError> {
        assert!(
            self.handle.is_none(),
            "embedded mongod is already started; call stop() before starting it again"
        );

        let process = self
            .builder
            .clone()
            .start(port)
            .await
            .map_err(StartupError::Process)?;
        let port = process.port();

        let client = match self.connector.connect(port, database).await {
            Ok(client) => client,
            Err(source) => {
                if let Err(err) = process.stop().await {
                    tracing::warn!(port, error = %err, "Failed to stop mongod after connect failure");
                }
                return Err(StartupError::Connect { port, source });
            }
        };

        tracing::info!(port, database, "Embedded mongod started");
        Ok(&*self.handle.insert(EmbeddedProcessHandle {
            port,
            database: database.to_string(),
            process,
            client,
        }))
    }

    /// Shuts the server down and drops the client.
    ///
    /// Does nothing if the manager is not started, so it may be called any
    /// number of times.
    pub async fn stop(&mut self) -> Result<(), MongodError> {
        let Some(EmbeddedProcessHandle {
            port,
            process,
            client,
            ..
        }) = self.handle.take()
        else {
            tracing::debug!("Embedded mongod not started, nothing to stop");
            return Ok(());
        };

        drop(client);
        process.stop().await?;
        tracing::info!(port, "Embedded mongod stopped");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// The running server, if started.
    pub fn handle(&self) -> Option<&EmbeddedProcessHandle> {
        self.handle.as_ref()
    }

    /// Client bound to the active database.
    ///
    /// # Panics
    ///
    /// If the manager is not started.
    pub fn client(&self) -> &dyn DocumentStore {
        match &self.handle {
            Some(handle) => handle.client(),
            None => panic!("embedded mongod is not started; call start() first"),
        }
    }

    /// Inserts `documents` into `collection`, in order.
    pub async fn fill_data(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<(), StoreError> {
        data::fill_data(self.client(), collection, documents).await
    }

    /// Drops every collection outside the `system.` namespace.
    pub async fn clear_data(&self) -> Result<Vec<String>, ResetError> {
        data::clear_data(self.client()).await
    }

    /// Drops exactly the named collections.
    pub async fn clear_collections<I>(&self, collections: I) -> Result<(), ResetError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        data::clear_collections(self.client(), collections).await
    }
}

#[async_trait]
impl<C: Connector> DocumentStore for EmbeddedMongo<C> {
    fn database(&self) -> &str {
        self.client().database()
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<(), StoreError> {
        self.client().insert_many(collection, documents).await
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        self.client().list_collection_names().await
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.client().drop_collection(collection).await
    }
}

impl<C> std::fmt::Debug for EmbeddedMongo<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedMongo")
            .field("builder", &self.builder)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Errors raised while starting the embedded server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The `mongod` process could not be launched or never became ready
    #[error("Failed to start embedded mongod")]
    Process(#[source] MongodError),

    /// The process started but the client could not connect to it
    ///
    /// The process has been stopped.
    #[error("Failed to connect to embedded mongod on port {port}")]
    Connect {
        port: u16,
        #[source]
        source: StoreError,
    },
}
