// Integration tests for startup failures of the lifecycle manager.
//
// A shell script stands in for `mongod` and the test itself listens on the
// port, so these run without a MongoDB installation.
#![cfg(unix)]

use std::{os::unix::fs::PermissionsExt as _, path::Path, time::Duration};

use async_trait::async_trait;
use fs_err as fs;
use mongounit::{
    Connector, DocumentStore, EmbeddedMongo, MongodBuilder, StartupError, StoreError,
};

/// Refuses every connection attempt.
struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    async fn connect(
        &self,
        port: u16,
        _database: &str,
    ) -> Result<Box<dyn DocumentStore>, StoreError> {
        Err(StoreError::Connect {
            url: embedded_mongod::connection_url(port),
            source: "connection refused by test".into(),
        })
    }
}

/// A server that becomes ready but cannot be connected to is stopped before
/// the error is returned.
#[tokio::test]
async fn start_with_connect_failure_stops_process() {
    //* Given
    let bin_dir = tempfile::tempdir().expect("tempdir should be created");
    let pid_file = bin_dir.path().join("mongod.pid");
    write_fake_mongod(
        bin_dir.path(),
        "7.0.14",
        &format!("echo $$ > {}\nexec sleep 30", pid_file.display()),
    );

    // The readiness probe only needs the port to accept TCP connections
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener
        .local_addr()
        .expect("listener should have an address")
        .port();

    let mut mongo = EmbeddedMongo::with_connector(
        MongodBuilder::new()
            .bin_path(bin_dir.path())
            .readiness_timeout(Duration::from_secs(10)),
        RefusingConnector,
    );

    //* When
    let result = mongo.start(port, "test").await.map(|handle| handle.port());

    //* Then
    assert!(
        matches!(result, Err(StartupError::Connect { port: p, .. }) if p == port),
        "expected Connect error, got {result:?}"
    );
    assert!(!mongo.is_started(), "a failed start should leave nothing running");

    let pid: i32 = fs::read_to_string(&pid_file)
        .expect("fake mongod should have written its pid")
        .trim()
        .parse()
        .expect("pid file should contain a number");
    let still_running = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok();
    assert!(!still_running, "mongod process should be stopped and reaped");

    drop(listener);
}

/// Write a fake `mongod` that reports `version` for `--version` and runs
/// `body` otherwise.
fn write_fake_mongod(bin_dir: &Path, version: &str, body: &str) {
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then\n  echo \"db version v{version}\"\n  exit 0\nfi\n{body}\n"
    );
    let path = bin_dir.join("mongod");
    fs::write(&path, script).expect("script should be written");
    let mut perms = fs::metadata(&path)
        .expect("script metadata should be readable")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("script should be made executable");
}
