// Integration tests exercising mongod startup failure handling.
//
// These tests stand in for `mongod` with small shell scripts, so they run
// without a MongoDB installation.
#![cfg(unix)]

use std::{os::unix::fs::PermissionsExt as _, path::Path, time::Duration};

use embedded_mongod::{MongodBuilder, MongodError, MongodVersion};
use fs_err as fs;

/// A bin_path without a mongod binary must fail before anything is spawned.
#[tokio::test]
async fn start_with_nonexistent_bin_path_returns_binary_not_found() {
    //* When
    let result = MongodBuilder::new().bin_path("/nonexistent").start(0).await;

    //* Then
    let err = result.expect_err("starting mongod from a nonexistent bin_path should fail");
    assert!(
        matches!(err, MongodError::BinaryNotFound { ref name } if name == "mongod"),
        "expected BinaryNotFound error, got {err:?}"
    );
}

/// A binary reporting another release than the pinned one is rejected.
#[tokio::test]
async fn start_with_other_engine_version_returns_version_mismatch() {
    //* Given
    let bin_dir = tempfile::tempdir().expect("tempdir should be created");
    write_fake_mongod(bin_dir.path(), "6.0.3", "exit 0");

    //* When
    let result = MongodBuilder::new()
        .version(MongodVersion::new("7.0"))
        .bin_path(bin_dir.path())
        .start(0)
        .await;

    //* Then
    let err = result.expect_err("version mismatch should fail startup");
    assert!(
        matches!(
            err,
            MongodError::VersionMismatch { ref expected, ref found }
                if expected == "7.0" && found == "6.0.3"
        ),
        "expected VersionMismatch error, got {err:?}"
    );
}

/// A binary whose `--version` output has no version line is rejected.
#[tokio::test]
async fn start_with_unrecognized_version_output_returns_version_unknown() {
    //* Given
    let bin_dir = tempfile::tempdir().expect("tempdir should be created");
    write_script(
        &bin_dir.path().join("mongod"),
        indoc::indoc! {r#"
            #!/bin/sh
            echo "something else entirely"
        "#},
    );

    //* When
    let result = MongodBuilder::new().bin_path(bin_dir.path()).start(0).await;

    //* Then
    let err = result.expect_err("unrecognized version output should fail startup");
    assert!(
        matches!(err, MongodError::VersionUnknown { ref output } if output == "something else entirely"),
        "expected VersionUnknown error, got {err:?}"
    );
}

/// A server that exits during startup is reported with its exit status
/// instead of waiting for the readiness deadline.
#[tokio::test]
async fn start_with_crashing_server_returns_unexpected_exit() {
    //* Given
    let bin_dir = tempfile::tempdir().expect("tempdir should be created");
    let log_dir = tempfile::tempdir().expect("tempdir should be created");
    write_fake_mongod(bin_dir.path(), "7.0.14", "echo boom >&2\nexit 3");

    //* When
    let started = std::time::Instant::now();
    let result = MongodBuilder::new()
        .bin_path(bin_dir.path())
        .log_dir(log_dir.path())
        .readiness_timeout(Duration::from_secs(20))
        .start(0)
        .await;

    //* Then
    let err = result.expect_err("crashing mongod should fail startup");
    match err {
        MongodError::UnexpectedExit { status, stderr_log } => {
            assert_eq!(status, Some(3), "exit status should be propagated");
            assert!(
                stderr_log.starts_with(log_dir.path()),
                "stderr log should be created in the configured log dir"
            );
            assert!(stderr_log.exists(), "stderr log should outlive the process");
        }
        other => panic!("expected UnexpectedExit error, got {other:?}"),
    }
    assert!(
        started.elapsed() < Duration::from_secs(20),
        "crash should be detected before the readiness deadline"
    );
}

/// A server that never opens its port is killed once the readiness deadline
/// passes, so no process outlives the failed start.
#[tokio::test]
async fn start_with_unresponsive_server_kills_process_and_returns_timeout() {
    //* Given
    let bin_dir = tempfile::tempdir().expect("tempdir should be created");
    let pid_file = bin_dir.path().join("mongod.pid");
    write_fake_mongod(
        bin_dir.path(),
        "7.0.14",
        &format!("echo $$ > {}\nexec sleep 30", pid_file.display()),
    );

    //* When
    let result = MongodBuilder::new()
        .bin_path(bin_dir.path())
        .readiness_timeout(Duration::from_millis(500))
        .start(0)
        .await;

    //* Then
    let err = result.expect_err("unresponsive mongod should fail startup");
    assert!(
        matches!(err, MongodError::ReadinessTimeout { timeout_ms: 500, .. }),
        "expected ReadinessTimeout error, got {err:?}"
    );

    let pid: i32 = fs::read_to_string(&pid_file)
        .expect("fake mongod should have written its pid")
        .trim()
        .parse()
        .expect("pid file should contain a number");
    let still_running = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok();
    assert!(!still_running, "mongod process should be killed and reaped");
}

/// Write a fake `mongod` that reports `version` for `--version` and runs
/// `body` otherwise.
fn write_fake_mongod(bin_dir: &Path, version: &str, body: &str) {
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then\n  echo \"db version v{version}\"\n  exit 0\nfi\n{body}\n"
    );
    write_script(&bin_dir.join("mongod"), &script);
}

/// Write an executable shell script.
fn write_script(path: &Path, content: &str) {
    fs::write(path, content).expect("script should be written");
    let mut perms = fs::metadata(path)
        .expect("script metadata should be readable")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("script should be made executable");
}
