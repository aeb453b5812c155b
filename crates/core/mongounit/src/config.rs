//! Harness configuration loaded from a TOML file with environment overrides.
//!
//! All keys are optional. Environment variables prefixed with
//! `MONGOUNIT_CONFIG_` override file values, with double underscores
//! separating nested keys: `MONGOUNIT_CONFIG_MONGOD__VERSION=6.0` sets
//! `mongod.version`.
//!
//! ```toml
//! port = 0
//! database = "orders_test"
//! fixtures_dir = "tests/fixtures"
//!
//! [mongod]
//! version = "7.0"
//! features = ["sync_delay"]
//! readiness_timeout_secs = 60
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use embedded_mongod::{DEFAULT_MONGOD_VERSION, Feature, MongodBuilder, MongodVersion};
use figment::{
    Figment,
    providers::{Env, Format as _, Toml},
};

/// Prefix of environment variables overriding file values.
pub const ENV_PREFIX: &str = "MONGOUNIT_CONFIG_";

/// Default loopback port of the embedded server.
pub const DEFAULT_PORT: u16 = 27018;

/// Default name of the active database.
pub const DEFAULT_DATABASE: &str = "test";

/// Default root directory of fixture files.
pub const DEFAULT_FIXTURES_DIR: &str = "tests/fixtures";

/// Default readiness probe deadline, in seconds.
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 30;

/// Settings of the harness as a whole.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct HarnessConfig {
    /// Loopback port for `mongod`; `0` picks a free port at start (default: 27018)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Name of the active database (default: `test`)
    #[serde(default = "default_database")]
    pub database: String,
    /// Directory fixture identifiers are resolved against (default: `tests/fixtures`)
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,
    /// Engine settings
    #[serde(default)]
    pub mongod: MongodConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            database: default_database(),
            fixtures_dir: default_fixtures_dir(),
            mongod: MongodConfig::default(),
        }
    }
}

/// Settings of the `mongod` process.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct MongodConfig {
    /// Pinned engine version, matched as a prefix of the installed one (default: `7.0`)
    #[serde(default = "default_version")]
    pub version: String,
    /// Feature flags passed at startup (default: `["sync_delay"]`)
    #[serde(default = "default_features")]
    pub features: Vec<Feature>,
    /// Directory containing the `mongod` binary; PATH is searched when unset
    #[serde(default)]
    pub bin_path: Option<PathBuf>,
    /// Deadline for the server to accept connections (default: 30)
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,
    /// Keep the temporary data directory after stop (default: false)
    #[serde(default)]
    pub keep_temp_dirs: bool,
}

impl Default for MongodConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            features: default_features(),
            bin_path: None,
            readiness_timeout_secs: default_readiness_timeout_secs(),
            keep_temp_dirs: false,
        }
    }
}

impl MongodConfig {
    /// The pinned version together with the configured features.
    pub fn mongod_version(&self) -> MongodVersion {
        MongodVersion::new(&self.version).with_features(self.features.iter().copied())
    }

    /// A process builder carrying these settings.
    pub fn builder(&self) -> MongodBuilder {
        let mut builder = MongodBuilder::new()
            .version(self.mongod_version())
            .readiness_timeout(Duration::from_secs(self.readiness_timeout_secs))
            .keep_data_dir(self.keep_temp_dirs);
        if let Some(bin_path) = &self.bin_path {
            builder = builder.bin_path(bin_path);
        }
        builder
    }
}

/// Loads the harness configuration from `config_path` and `MONGOUNIT_CONFIG_*`
/// environment variables.
///
/// A missing file is not an error; every key then takes its default.
pub fn load(config_path: &Path) -> Result<HarnessConfig, LoadConfigError> {
    extract(figment(config_path).merge(Env::prefixed(ENV_PREFIX).split("__")))
}

fn figment(config_path: &Path) -> Figment {
    Figment::new().merge(Toml::file(config_path))
}

fn extract(figment: Figment) -> Result<HarnessConfig, LoadConfigError> {
    figment
        .extract()
        .map_err(|err| LoadConfigError(Box::new(err)))
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from(DEFAULT_FIXTURES_DIR)
}

fn default_version() -> String {
    DEFAULT_MONGOD_VERSION.to_string()
}

fn default_features() -> Vec<Feature> {
    vec![Feature::SyncDelay]
}

fn default_readiness_timeout_secs() -> u64 {
    DEFAULT_READINESS_TIMEOUT_SECS
}

/// Error when loading the harness configuration.
#[derive(Debug, thiserror::Error)]
#[error("Failed to load mongounit configuration")]
pub struct LoadConfigError(#[source] pub Box<figment::Error>);
