//! MongoDB test harness
//!
//! Runs an embedded `mongod` for a test suite, loads JSON fixture files into
//! it before each test, and drops everything the test left behind afterwards.
//!
//! # Example
//!
//! ```ignore
//! use mongounit::{DeclaredFixtures, EmbeddedMongo, FixtureHook, config};
//!
//! let config = config::load("mongounit.toml".as_ref())?;
//! let mut mongo = EmbeddedMongo::from_config(&config.mongod);
//! mongo.start(config.port, &config.database).await?;
//!
//! let hook = FixtureHook::from_config(&config);
//! let declarations = DeclaredFixtures::new().declare("finds_user", ["/users.json"]);
//!
//! hook.run_declared(&mongo, &declarations, "finds_user", || async {
//!     // assertions against the database
//!     Ok(())
//! })
//! .await?;
//!
//! mongo.stop().await?;
//! ```
//!
//! # Fixture files
//!
//! See [`fixture`] for the file format. Identifiers are resolved by a
//! [`FixtureResolver`]; the default [`DirResolver`] reads them from
//! `tests/fixtures`.

pub mod config;
pub mod data;
pub mod fixture;
mod hook;
pub mod json;
mod loader;
pub mod logging;
mod manager;
mod memory;
mod mongo;
mod resolver;
mod store;

pub use embedded_mongod::{Feature, MongodBuilder, MongodError, MongodVersion};

pub use self::{
    config::{HarnessConfig, LoadConfigError, MongodConfig},
    data::ResetError,
    fixture::{CollectionBlock, FixtureDocument, FixtureLoadError},
    hook::{DeclaredFixtures, FixtureDeclarations, FixtureHook, Phase, TestFailure},
    loader::FixtureLoader,
    manager::{EmbeddedMongo, EmbeddedProcessHandle, StartupError},
    memory::MemoryStore,
    mongo::{MongoConnector, MongoStore},
    resolver::{DirResolver, FixtureResolver, StaticResolver},
    store::{BoxError, Connector, Document, DocumentStore, StoreError},
};
