//! Loading fixture files into a database.

use crate::{
    data,
    fixture::{CollectionBlock, FixtureLoadError, parse_blocks},
    resolver::{DirResolver, FixtureResolver},
    store::DocumentStore,
};

/// Reads fixture files through a [`FixtureResolver`] and inserts their
/// documents.
///
/// Fixtures are loaded in the order given and blocks in file order. Loading
/// stops at the first error; whatever was inserted before it stays in the
/// database.
#[derive(Debug, Clone, Default)]
pub struct FixtureLoader<R = DirResolver> {
    resolver: R,
}

impl<R: FixtureResolver> FixtureLoader<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Loads every fixture in `fixtures` into `store` and returns the number
    /// of inserted documents.
    ///
    /// An empty list touches neither the resolver nor the store.
    pub async fn load_fixtures<S, F>(
        &self,
        store: &S,
        fixtures: &[F],
    ) -> Result<usize, FixtureLoadError>
    where
        S: DocumentStore + ?Sized,
        F: AsRef<str>,
    {
        let mut inserted = 0;
        for fixture in fixtures {
            inserted += self.load_fixture(store, fixture.as_ref()).await?;
        }
        Ok(inserted)
    }

    /// Loads a single fixture file into `store`.
    pub async fn load_fixture<S>(&self, store: &S, fixture: &str) -> Result<usize, FixtureLoadError>
    where
        S: DocumentStore + ?Sized,
    {
        let content =
            self.resolver
                .resolve(fixture)
                .await
                .map_err(|source| FixtureLoadError::Resolve {
                    fixture: fixture.to_string(),
                    source,
                })?;

        let blocks = parse_blocks(fixture, &content)?;
        tracing::debug!(fixture, blocks = blocks.len(), "Loading fixture");

        let mut inserted = 0;
        for (index, value) in blocks.into_iter().enumerate() {
            let CollectionBlock {
                collection_name,
                data,
            } = CollectionBlock::from_value(fixture, index, value)?;

            let count = data.len();
            data::fill_data(store, &collection_name, data)
                .await
                .map_err(|source| FixtureLoadError::Insert {
                    fixture: fixture.to_string(),
                    collection: collection_name.clone(),
                    source,
                })?;
            inserted += count;
        }

        tracing::info!(fixture, documents = inserted, "Loaded fixture");
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{MemoryStore, resolver::StaticResolver};

    #[tokio::test]
    async fn load_fixtures_with_empty_list_is_noop() {
        //* Given
        let loader = FixtureLoader::new(StaticResolver::new());
        let store = MemoryStore::new("test");

        //* When
        let inserted = loader
            .load_fixtures(&store, &[] as &[&str])
            .await
            .expect("empty list should load");

        //* Then
        assert_eq!(inserted, 0);
        assert!(store.collection_names().is_empty());
    }

    #[tokio::test]
    async fn load_fixtures_inserts_blocks_in_file_order() {
        //* Given
        let resolver = StaticResolver::new().with(
            "two.json",
            r#"[
                {"collectionName": "users", "data": [{"name": "a"}]},
                {"collectionName": "users", "data": [{"name": "b"}, {"name": "c"}]},
                {"collectionName": "empty", "data": []}
            ]"#,
        );
        let loader = FixtureLoader::new(resolver);
        let store = MemoryStore::new("test");

        //* When
        let inserted = loader
            .load_fixtures(&store, &["two.json"])
            .await
            .expect("fixture should load");

        //* Then
        assert_eq!(inserted, 3);
        let names: Vec<_> = store
            .documents("users")
            .expect("users should exist")
            .into_iter()
            .map(|d| d["name"].clone())
            .collect();
        assert_eq!(names, [json!("a"), json!("b"), json!("c")]);
        assert_eq!(store.documents("empty"), None);
    }

    #[tokio::test]
    async fn load_fixtures_keeps_blocks_before_invalid_one() {
        //* Given
        let resolver = StaticResolver::new().with(
            "partial.json",
            r#"[
                {"collectionName": "users", "data": [{"name": "a"}]},
                {"collectionName": "orders"}
            ]"#,
        );
        let loader = FixtureLoader::new(resolver);
        let store = MemoryStore::new("test");

        //* When
        let result = loader.load_fixtures(&store, &["partial.json"]).await;

        //* Then
        assert!(
            matches!(result, Err(FixtureLoadError::MissingData { index: 1, .. })),
            "got {result:?}"
        );
        assert_eq!(store.collection_names(), ["users"]);
    }

    #[tokio::test]
    async fn load_fixtures_with_unresolvable_id_names_it() {
        let loader = FixtureLoader::new(StaticResolver::new());
        let store = MemoryStore::new("test");

        let err = loader
            .load_fixtures(&store, &["nowhere.json"])
            .await
            .expect_err("unknown fixture should fail");

        assert!(matches!(err, FixtureLoadError::Resolve { .. }), "got {err:?}");
        assert_eq!(err.fixture(), "nowhere.json");
    }
}
