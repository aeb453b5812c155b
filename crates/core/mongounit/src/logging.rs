//! Logging setup for test binaries using tracing_subscriber.

use std::{io::IsTerminal, sync::Once};

use tracing_subscriber::{EnvFilter, filter::LevelFilter};

static MONGOUNIT_LOG_ENV_VAR: &str = "MONGOUNIT_LOG";

/// Crates of this workspace that receive the `MONGOUNIT_LOG` level.
const MONGOUNIT_CRATES: &[&str] = &["embedded_mongod", "mongounit"];

/// Installs a global fmt subscriber writing to stderr.
///
/// Safe to call from every test; only the first call has an effect. If
/// another global subscriber is already installed, it is left in place.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let (env_filter, log_level) = env_filter_and_log_level();

        let installed = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .try_init()
            .is_ok();

        if installed {
            tracing::info!("log level: {}", log_level);
        }
    });
}

fn env_filter_and_log_level() -> (EnvFilter, String) {
    // Directives from RUST_LOG take precedence over the per-crate default
    let directive_string = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let mut env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::ERROR.into())
        .parse_lossy(&directive_string);

    let log_level =
        std::env::var(MONGOUNIT_LOG_ENV_VAR).unwrap_or_else(|_| "info".to_string());

    for crate_name in MONGOUNIT_CRATES {
        if directive_string.contains(&format!("{crate_name}=")) {
            continue;
        }
        match format!("{crate_name}={log_level}").parse() {
            Ok(directive) => env_filter = env_filter.add_directive(directive),
            Err(err) => eprintln!("ignoring invalid {MONGOUNIT_LOG_ENV_VAR} value '{log_level}': {err}"),
        }
    }

    (env_filter, log_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// If this fails, update `MONGOUNIT_CRATES` to match the workspace.
    #[test]
    fn mongounit_crates_match_workspace_members() {
        use cargo_metadata::MetadataCommand;

        let metadata = MetadataCommand::new()
            .no_deps()
            .exec()
            .expect("cargo metadata should run");
        let mut names: Vec<String> = metadata
            .workspace_packages()
            .into_iter()
            .map(|pkg| pkg.name.replace('-', "_"))
            .collect();
        names.sort();
        assert_eq!(names, MONGOUNIT_CRATES);
    }

    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
        tracing::debug!("still logging");
    }
}
