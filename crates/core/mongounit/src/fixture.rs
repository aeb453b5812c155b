//! Fixture file format.
//!
//! A fixture file is a JSON array of collection blocks:
//!
//! ```json
//! [
//!   { "collectionName": "users", "data": [ { "name": "a" }, { "name": "b" } ] },
//!   { "collectionName": "orders", "data": [] }
//! ]
//! ```
//!
//! Both keys are required in every block. Documents are inserted verbatim, in
//! file order, with their field order preserved.

use serde_json::Value;

use crate::store::{Document, StoreError};

/// Key holding the target collection of a block.
const COLLECTION_NAME_KEY: &str = "collectionName";

/// Key holding the documents of a block.
const DATA_KEY: &str = "data";

/// One entry of a fixture file: documents destined for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionBlock {
    pub collection_name: String,
    pub data: Vec<Document>,
}

impl CollectionBlock {
    /// Validates the `index`-th element of the fixture file `fixture`.
    ///
    /// A `null` value counts as missing.
    pub fn from_value(fixture: &str, index: usize, value: Value) -> Result<Self, FixtureLoadError> {
        let Value::Object(mut block) = value else {
            return Err(FixtureLoadError::InvalidBlock {
                fixture: fixture.to_string(),
                index,
            });
        };

        let collection_name = match block.remove(COLLECTION_NAME_KEY) {
            None | Some(Value::Null) => {
                return Err(FixtureLoadError::MissingCollectionName {
                    fixture: fixture.to_string(),
                    index,
                });
            }
            Some(Value::String(name)) if !name.is_empty() => name,
            Some(_) => {
                return Err(FixtureLoadError::InvalidCollectionName {
                    fixture: fixture.to_string(),
                    index,
                });
            }
        };

        let documents = match block.remove(DATA_KEY) {
            None | Some(Value::Null) => {
                return Err(FixtureLoadError::MissingData {
                    fixture: fixture.to_string(),
                    index,
                    collection: collection_name,
                });
            }
            Some(Value::Array(documents)) => documents,
            Some(_) => {
                return Err(FixtureLoadError::InvalidData {
                    fixture: fixture.to_string(),
                    index,
                    collection: collection_name,
                });
            }
        };

        let mut data = Vec::with_capacity(documents.len());
        for (position, document) in documents.into_iter().enumerate() {
            let Value::Object(document) = document else {
                return Err(FixtureLoadError::InvalidDocument {
                    fixture: fixture.to_string(),
                    collection: collection_name,
                    position,
                });
            };
            data.push(document);
        }

        Ok(Self {
            collection_name,
            data,
        })
    }
}

/// Parses `content` and returns the raw blocks of the top-level array.
///
/// Blocks are validated separately with [`CollectionBlock::from_value`] so
/// that a loader can act on each block before looking at the next one.
pub fn parse_blocks(fixture: &str, content: &str) -> Result<Vec<Value>, FixtureLoadError> {
    let root: Value =
        serde_json::from_str(content).map_err(|source| FixtureLoadError::Parse {
            fixture: fixture.to_string(),
            source,
        })?;

    match root {
        Value::Array(blocks) => Ok(blocks),
        _ => Err(FixtureLoadError::NotAList {
            fixture: fixture.to_string(),
        }),
    }
}

/// A fully validated fixture file.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDocument {
    pub blocks: Vec<CollectionBlock>,
}

impl FixtureDocument {
    /// Parses and validates every block of a fixture file up front.
    ///
    /// Useful for checking fixture files; loading goes block by block instead.
    pub fn parse(fixture: &str, content: &str) -> Result<Self, FixtureLoadError> {
        let blocks = parse_blocks(fixture, content)?
            .into_iter()
            .enumerate()
            .map(|(index, value)| CollectionBlock::from_value(fixture, index, value))
            .collect::<Result<_, _>>()?;
        Ok(Self { blocks })
    }
}

/// Errors raised while loading fixture files.
///
/// Every variant names the fixture file it occurred in.
#[derive(Debug, thiserror::Error)]
pub enum FixtureLoadError {
    /// The fixture identifier could not be resolved to UTF-8 text
    #[error("Cannot read fixture file '{fixture}'")]
    Resolve {
        fixture: String,
        #[source]
        source: std::io::Error,
    },

    /// The fixture content is not valid JSON
    #[error("Fixture file '{fixture}' is not valid JSON")]
    Parse {
        fixture: String,
        #[source]
        source: serde_json::Error,
    },

    /// The top-level JSON value is not an array
    #[error("Fixture file '{fixture}' does not contain a list of objects")]
    NotAList { fixture: String },

    /// A block is not a JSON object
    #[error("Block {index} of fixture file '{fixture}' is not an object")]
    InvalidBlock { fixture: String, index: usize },

    /// A block has no `collectionName`
    #[error("'collectionName' is required (fixture file '{fixture}', block {index})")]
    MissingCollectionName { fixture: String, index: usize },

    /// A block's `collectionName` is not a non-empty string
    #[error("'collectionName' must be a non-empty string (fixture file '{fixture}', block {index})")]
    InvalidCollectionName { fixture: String, index: usize },

    /// A block has no `data`
    #[error("'data' is required (fixture file '{fixture}', block {index}, collection '{collection}')")]
    MissingData {
        fixture: String,
        index: usize,
        collection: String,
    },

    /// A block's `data` is not an array
    #[error("'data' must be a list (fixture file '{fixture}', block {index}, collection '{collection}')")]
    InvalidData {
        fixture: String,
        index: usize,
        collection: String,
    },

    /// An element of `data` is not a JSON object
    #[error("Document {position} for collection '{collection}' in fixture file '{fixture}' is not an object")]
    InvalidDocument {
        fixture: String,
        collection: String,
        position: usize,
    },

    /// Inserting a block's documents failed
    #[error("Cannot load fixture file '{fixture}' into collection '{collection}'")]
    Insert {
        fixture: String,
        collection: String,
        #[source]
        source: StoreError,
    },
}

impl FixtureLoadError {
    /// Identifier of the fixture file the error occurred in.
    pub fn fixture(&self) -> &str {
        match self {
            Self::Resolve { fixture, .. }
            | Self::Parse { fixture, .. }
            | Self::NotAList { fixture }
            | Self::InvalidBlock { fixture, .. }
            | Self::MissingCollectionName { fixture, .. }
            | Self::InvalidCollectionName { fixture, .. }
            | Self::MissingData { fixture, .. }
            | Self::InvalidData { fixture, .. }
            | Self::InvalidDocument { fixture, .. }
            | Self::Insert { fixture, .. } => fixture,
        }
    }
}
