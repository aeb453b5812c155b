//! Per-test wrapper: load fixtures, run the body, reset the database.

use std::{any::Any, collections::BTreeMap, future::Future, panic::AssertUnwindSafe};

use futures::FutureExt as _;
use tracing::{Instrument as _, info_span};

use crate::{
    config::HarnessConfig,
    data::{self, ResetError},
    fixture::FixtureLoadError,
    loader::FixtureLoader,
    resolver::{DirResolver, FixtureResolver},
    store::{BoxError, DocumentStore},
};

/// Source of the fixture files a test declares.
pub trait FixtureDeclarations: Send + Sync {
    /// Fixture identifiers declared by `test`, in load order. Empty when the
    /// test declares none.
    fn fixtures_for(&self, test: &str) -> Vec<String>;
}

/// Fixture declarations kept in a map from test name to fixture list.
#[derive(Debug, Clone, Default)]
pub struct DeclaredFixtures {
    by_test: BTreeMap<String, Vec<String>>,
}

impl DeclaredFixtures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the fixtures of `test`, replacing any earlier declaration.
    #[must_use]
    pub fn declare<I>(mut self, test: impl Into<String>, fixtures: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.by_test
            .insert(test.into(), fixtures.into_iter().map(Into::into).collect());
        self
    }
}

impl FixtureDeclarations for DeclaredFixtures {
    fn fixtures_for(&self, test: &str) -> Vec<String> {
        self.by_test.get(test).cloned().unwrap_or_default()
    }
}

/// Steps of a single hooked test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FixturesLoading,
    TestRunning,
    Cleaning,
    Done,
}

/// Runs each test between a fixture load and a full database reset.
///
/// The reset runs exactly once per test, whether fixtures were declared or
/// not and whatever the body did: returned, failed, or panicked.
#[derive(Debug, Clone, Default)]
pub struct FixtureHook<R = DirResolver> {
    loader: FixtureLoader<R>,
}

impl FixtureHook<DirResolver> {
    /// A hook resolving fixtures under the configured fixtures directory.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(FixtureLoader::new(DirResolver::new(&config.fixtures_dir)))
    }
}

impl<R: FixtureResolver> FixtureHook<R> {
    pub fn new(loader: FixtureLoader<R>) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &FixtureLoader<R> {
        &self.loader
    }

    /// Runs `body` after loading the fixtures `test` declares.
    pub async fn run_declared<S, D, F, Fut, T>(
        &self,
        store: &S,
        declarations: &D,
        test: &str,
        body: F,
    ) -> Result<T, TestFailure>
    where
        S: DocumentStore + ?Sized,
        D: FixtureDeclarations + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let fixtures = declarations.fixtures_for(test);
        self.run(store, fixtures.as_slice(), body)
            .instrument(info_span!("mongounit_test", test))
            .await
    }

    /// Loads `fixtures` into `store`, runs `body`, then resets `store`.
    ///
    /// A fixture load failure skips the body and is returned as
    /// [`TestFailure::Setup`]. A panic in the body is resumed once the reset
    /// has run.
    pub async fn run<S, I, F, Fut, T>(
        &self,
        store: &S,
        fixtures: &[I],
        body: F,
    ) -> Result<T, TestFailure>
    where
        S: DocumentStore + ?Sized,
        I: AsRef<str>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        enter(Phase::Idle);

        enter(Phase::FixturesLoading);
        let outcome = match self.loader.load_fixtures(store, fixtures).await {
            Err(err) => {
                tracing::warn!(fixture = err.fixture(), error = %err, "Fixture setup failed, skipping test body");
                Outcome::Failed(TestFailure::Setup(err))
            }
            Ok(_) => {
                enter(Phase::TestRunning);
                match AssertUnwindSafe(async move { body().await })
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(value)) => Outcome::Passed(value),
                    Ok(Err(err)) => Outcome::Failed(TestFailure::Body(err)),
                    Err(panic) => Outcome::Panicked(panic),
                }
            }
        };

        enter(Phase::Cleaning);
        let reset = data::clear_data(store).await;
        enter(Phase::Done);

        match (outcome, reset) {
            (Outcome::Passed(value), Ok(_)) => Ok(value),
            (Outcome::Passed(_), Err(source)) => Err(TestFailure::Reset {
                source,
                earlier: None,
            }),
            (Outcome::Failed(failure), Ok(_)) => Err(failure),
            (Outcome::Failed(failure), Err(source)) => Err(TestFailure::Reset {
                source,
                earlier: Some(Box::new(failure)),
            }),
            (Outcome::Panicked(panic), reset) => {
                if let Err(err) = reset {
                    tracing::error!(error = %err, "Database reset failed after test panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

enum Outcome<T> {
    Passed(T),
    Failed(TestFailure),
    Panicked(Box<dyn Any + Send>),
}

fn enter(phase: Phase) {
    tracing::debug!(?phase, "Test hook phase");
}

/// Why a hooked test did not pass.
#[derive(Debug, thiserror::Error)]
pub enum TestFailure {
    /// Fixture loading failed; the test body did not run
    #[error("Test setup failed")]
    Setup(#[source] FixtureLoadError),

    /// The test body returned an error
    #[error("Test failed")]
    Body(#[source] BoxError),

    /// Resetting the database after the test failed
    ///
    /// `earlier` holds the setup or body failure that preceded it, if any.
    #[error("Database reset failed after test")]
    Reset {
        #[source]
        source: ResetError,
        earlier: Option<Box<TestFailure>>,
    },
}

impl TestFailure {
    /// The phase the failure occurred in.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Setup(_) => Phase::FixturesLoading,
            Self::Body(_) => Phase::TestRunning,
            Self::Reset { .. } => Phase::Cleaning,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::FutureExt as _;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{MemoryStore, resolver::StaticResolver};

    const USERS: &str = r#"[{"collectionName": "users", "data": [{"name": "a"}]}]"#;

    fn hook() -> FixtureHook<StaticResolver> {
        FixtureHook::new(FixtureLoader::new(
            StaticResolver::new()
                .with("users.json", USERS)
                .with("broken.json", r#"{"collectionName": "users"}"#),
        ))
    }

    #[tokio::test]
    async fn run_declared_without_declaration_still_resets() {
        //* Given
        let store = MemoryStore::new("test");
        store.create_collection("leftover");

        //* When
        let result = hook()
            .run_declared(&store, &DeclaredFixtures::new(), "no_fixtures", || async {
                Ok(())
            })
            .await;

        //* Then
        assert!(result.is_ok(), "got {result:?}");
        assert!(store.collection_names().is_empty());
    }

    #[tokio::test]
    async fn run_declared_loads_fixtures_before_body() {
        //* Given
        let store = MemoryStore::new("test");
        let declarations = DeclaredFixtures::new().declare("reads_users", ["users.json"]);

        //* When
        let seen = hook()
            .run_declared(&store, &declarations, "reads_users", || async {
                Ok(store.documents("users").map(|docs| docs.len()))
            })
            .await
            .expect("test should pass");

        //* Then
        assert_eq!(seen, Some(1));
        assert_eq!(store.documents("users"), None);
    }

    #[tokio::test]
    async fn run_with_setup_failure_skips_body() {
        //* Given
        let store = MemoryStore::new("test");
        let ran = Cell::new(false);

        //* When
        let result = hook()
            .run(&store, &["users.json", "broken.json"], || async {
                ran.set(true);
                Ok(())
            })
            .await;

        //* Then
        let err = result.expect_err("setup should fail");
        assert_eq!(err.phase(), Phase::FixturesLoading);
        assert!(matches!(err, TestFailure::Setup(FixtureLoadError::NotAList { .. })), "got {err:?}");
        assert!(!ran.get(), "body should not run after a setup failure");
        assert!(store.collection_names().is_empty(), "partial load should be reset");
    }

    #[tokio::test]
    async fn run_with_body_error_is_body_failure() {
        let store = MemoryStore::new("test");

        let result: Result<(), _> = hook()
            .run(&store, &["users.json"], || async { Err("assertion failed".into()) })
            .await;

        let err = result.expect_err("body error should fail the test");
        assert!(matches!(err, TestFailure::Body(_)), "got {err:?}");
        assert!(store.collection_names().is_empty());
    }

    #[tokio::test]
    async fn run_with_reset_failure_keeps_earlier_failure() {
        //* Given
        let store = MemoryStore::new("test");
        store.create_collection("sticky");
        store.fail_drop_of("sticky");

        //* When
        let result: Result<(), _> = hook()
            .run(&store, &[] as &[&str], || async { Err("boom".into()) })
            .await;

        //* Then
        let err = result.expect_err("reset should fail");
        assert_eq!(err.phase(), Phase::Cleaning);
        let TestFailure::Reset { earlier, .. } = err else {
            panic!("expected Reset failure");
        };
        assert!(
            matches!(earlier.as_deref(), Some(TestFailure::Body(_))),
            "earlier failure should be kept, got {earlier:?}"
        );
    }

    #[tokio::test]
    async fn run_with_panicking_body_resets_then_resumes_panic() {
        //* Given
        let store = MemoryStore::new("test");
        let hook = hook();

        //* When
        let result = AssertUnwindSafe(hook.run(&store, &["users.json"], || async {
            if store.documents("users").is_some() {
                panic!("body panicked");
            }
            Ok(())
        }))
        .catch_unwind()
        .await;

        //* Then
        assert!(result.is_err(), "panic should be resumed");
        assert!(store.collection_names().is_empty(), "reset should run before resuming");
    }
}
