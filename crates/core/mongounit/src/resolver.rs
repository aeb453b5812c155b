//! Turning fixture identifiers into fixture content.

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

/// Maps a fixture identifier to the UTF-8 text of the fixture file.
#[async_trait]
pub trait FixtureResolver: Send + Sync {
    async fn resolve(&self, fixture: &str) -> io::Result<String>;
}

/// Resolves fixture identifiers as paths relative to a base directory.
///
/// A leading `/` is stripped, so `/users.json` and `users.json` name the
/// same file.
#[derive(Debug, Clone)]
pub struct DirResolver {
    base: PathBuf,
}

impl DirResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path the identifier `fixture` resolves to.
    pub fn path_of(&self, fixture: &str) -> PathBuf {
        self.base.join(fixture.trim_start_matches('/'))
    }
}

impl Default for DirResolver {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FIXTURES_DIR)
    }
}

#[async_trait]
impl FixtureResolver for DirResolver {
    async fn resolve(&self, fixture: &str) -> io::Result<String> {
        fs_err::tokio::read_to_string(self.path_of(fixture)).await
    }
}

/// Serves fixture content registered in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    fixtures: BTreeMap<String, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `content` under the identifier `fixture`.
    #[must_use]
    pub fn with(mut self, fixture: impl Into<String>, content: impl Into<String>) -> Self {
        self.fixtures.insert(fixture.into(), content.into());
        self
    }
}

#[async_trait]
impl FixtureResolver for StaticResolver {
    async fn resolve(&self, fixture: &str) -> io::Result<String> {
        self.fixtures.get(fixture).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no fixture registered as '{fixture}'"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dir_resolver_strips_leading_slash() {
        //* Given
        let dir = tempfile::tempdir().expect("tempdir should be created");
        fs_err::write(dir.path().join("users.json"), "[]").expect("fixture should be written");
        let resolver = DirResolver::new(dir.path());

        //* When
        let with_slash = resolver.resolve("/users.json").await;
        let without_slash = resolver.resolve("users.json").await;

        //* Then
        assert_eq!(with_slash.expect("absolute-style id should resolve"), "[]");
        assert_eq!(without_slash.expect("relative id should resolve"), "[]");
    }

    #[tokio::test]
    async fn dir_resolver_missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let err = DirResolver::new(dir.path())
            .resolve("missing.json")
            .await
            .expect_err("missing file should fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn static_resolver_serves_registered_content() {
        let resolver = StaticResolver::new().with("a.json", "[1]");
        assert_eq!(resolver.resolve("a.json").await.expect("registered"), "[1]");
        assert_eq!(
            resolver
                .resolve("b.json")
                .await
                .expect_err("unregistered")
                .kind(),
            io::ErrorKind::NotFound
        );
    }
}
