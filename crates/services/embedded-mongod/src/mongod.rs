//! `mongod` process management.
//!
//! Spawns a system `mongod` binary bound to the loopback interface with a
//! throwaway `--dbpath`, waits until its TCP port accepts connections, and
//! shuts it down with SIGTERM (escalating to SIGKILL). The binary must be
//! available in `PATH` (discovered via the [`which`] crate) or supplied via
//! [`MongodBuilder::bin_path`].
//!
//! | Binary   | Role                  | Reference |
//! |----------|-----------------------|-----------|
//! | `mongod` | Run the database server | [`mongod`](https://www.mongodb.com/docs/manual/reference/program/mongod/) |
//!
//! The engine version is pinned: `mongod --version` is checked against the
//! configured [`MongodVersion`] before the server is spawned.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use backon::{ExponentialBuilder, Retryable};
use tokio::{
    io::{AsyncBufReadExt as _, AsyncRead, BufReader},
    process::{Child, Command},
    task::JoinHandle,
    time::Duration,
};

use crate::output::{OutputSink, OutputSinkError};

/// Name of the server binary
const MONGOD_BINARY: &str = "mongod";

/// Loopback address the server binds to
pub const LOOPBACK_ADDR: &str = "127.0.0.1";

/// Engine version used when none is configured
pub const DEFAULT_MONGOD_VERSION: &str = "7.0";

/// Default timeout for mongod to accept connections (seconds)
const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 30;

/// Time allowed for mongod to exit after SIGTERM before SIGKILL
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the output forwarding tasks to reach EOF after exit
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Log file prefix for captured stdout
const STDOUT_FILE_PREFIX: &str = "mongod-";

/// Log file prefix for captured stderr
const STDERR_FILE_PREFIX: &str = "mongod-error-";

/// Directory prefix for the temporary `--dbpath`
const DATA_DIR_PREFIX: &str = "mongod-data-";

/// Optional engine behaviours enabled through command-line flags.
///
/// Legacy flags (`NoPrealloc`, `NoHttpInterface`) are only understood by old
/// engine releases; enabling them against a modern `mongod` makes startup fail.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Flush data files on every write (`--syncdelay 0`).
    SyncDelay,
    /// Enable text search on engines where it is opt-in.
    TextSearch,
    /// Skip data file preallocation (`--noprealloc`).
    NoPrealloc,
    /// Disable the legacy HTTP status interface (`--nohttpinterface`).
    NoHttpInterface,
}

impl Feature {
    /// Command-line arguments enabling this feature.
    pub fn args(self) -> &'static [&'static str] {
        match self {
            Self::SyncDelay => &["--syncdelay", "0"],
            Self::TextSearch => &["--setParameter", "textSearchEnabled=true"],
            Self::NoPrealloc => &["--noprealloc"],
            Self::NoHttpInterface => &["--nohttpinterface"],
        }
    }
}

/// Pinned engine version plus the feature set passed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongodVersion {
    version: String,
    features: BTreeSet<Feature>,
}

impl MongodVersion {
    /// Pins the given dotted version without any features.
    ///
    /// A pinned `"7.0"` accepts any `7.0.x` binary; `"7.0.14"` accepts only
    /// that exact release.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            features: BTreeSet::new(),
        }
    }

    /// Adds a feature flag.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.insert(feature);
        self
    }

    /// Adds every feature flag from `features`.
    #[must_use]
    pub fn with_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.features.extend(features);
        self
    }

    /// The pinned version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The enabled features, in a stable order.
    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.features.iter().copied()
    }

    /// Whether a version reported by `mongod --version` satisfies the pin.
    ///
    /// Every dotted component of the pin must equal the corresponding
    /// component of the reported version.
    pub fn matches(&self, reported: &str) -> bool {
        let pinned: Vec<&str> = self.version.split('.').collect();
        let reported: Vec<&str> = reported.split('.').collect();
        pinned.len() <= reported.len() && pinned.iter().zip(&reported).all(|(p, r)| p == r)
    }
}

impl Default for MongodVersion {
    fn default() -> Self {
        Self::new(DEFAULT_MONGOD_VERSION).with_feature(Feature::SyncDelay)
    }
}

/// Builder for configuring and starting a managed `mongod` instance.
///
/// # Example
///
/// ```ignore
/// use embedded_mongod::{Feature, MongodBuilder, MongodVersion};
///
/// let process = MongodBuilder::new()
///     .version(MongodVersion::new("7.0").with_feature(Feature::SyncDelay))
///     .bin_path("/opt/mongodb/bin")
///     .start(27018)
///     .await?;
///
/// // ... run tests against process.connection_url() ...
///
/// process.stop().await?;
/// ```
#[derive(Debug, Clone)]
pub struct MongodBuilder {
    version: MongodVersion,
    bin_path: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    readiness_timeout: Duration,
    keep_data_dir: bool,
    wait_for_exit: bool,
}

impl Default for MongodBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MongodBuilder {
    /// Creates a builder pinned to [`MongodVersion::default`].
    pub fn new() -> Self {
        Self {
            version: MongodVersion::default(),
            bin_path: None,
            log_dir: None,
            readiness_timeout: Duration::from_secs(DEFAULT_READINESS_TIMEOUT_SECS),
            keep_data_dir: false,
            wait_for_exit: true,
        }
    }

    /// Sets the pinned engine version and feature set.
    #[must_use]
    pub fn version(mut self, version: MongodVersion) -> Self {
        self.version = version;
        self
    }

    /// Sets the directory containing the `mongod` binary.
    ///
    /// When unset, `mongod` is looked up in `PATH`.
    #[must_use]
    pub fn bin_path(mut self, path: impl AsRef<Path>) -> Self {
        self.bin_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the directory where stdout/stderr log files are created.
    ///
    /// Defaults to the system temp directory.
    #[must_use]
    pub fn log_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.log_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets how long to wait for the server port to accept connections.
    #[must_use]
    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Keeps the temporary `--dbpath` directory on disk after the process stops.
    #[must_use]
    pub fn keep_data_dir(mut self, keep: bool) -> Self {
        self.keep_data_dir = keep;
        self
    }

    /// Controls whether [`Drop`] performs a blocking waitpid loop to let
    /// `mongod` release its data files before the process is reaped.
    ///
    /// | `wait_for_exit` | `kill_on_drop` | Drop behavior |
    /// |---|---|---|
    /// | `true` **(default)** | `false` | SIGINT → waitpid polling → SIGKILL escalation |
    /// | `false` | `true` | No blocking wait; tokio sends SIGKILL when `Child` drops |
    ///
    /// Only the synchronous [`Drop`] safety net is affected. The async
    /// [`MongodProcess::stop`] path always signals and waits.
    #[must_use]
    pub fn wait_for_exit(mut self, wait: bool) -> Self {
        self.wait_for_exit = wait;
        self
    }

    /// Resolves the `mongod` binary path, using `bin_path` if set or falling
    /// back to PATH-based discovery via the `which` crate.
    fn resolve_binary(&self, name: &str) -> Result<PathBuf, MongodError> {
        if let Some(ref bin_dir) = self.bin_path {
            let path = bin_dir.join(name);
            if path.exists() {
                return Ok(path);
            }
            return Err(MongodError::BinaryNotFound {
                name: name.to_string(),
            });
        }
        which::which(name).map_err(|_| MongodError::BinaryNotFound {
            name: name.to_string(),
        })
    }

    /// Starts `mongod` on the loopback interface and waits until it is ready.
    ///
    /// A `port` of `0` allocates a free port; the chosen port is available via
    /// [`MongodProcess::port`].
    ///
    /// This method:
    /// 1. Resolves the binary and checks its version against the pin
    /// 2. Creates the temporary data directory and the output log files
    /// 3. Spawns `mongod` with piped stdout/stderr forwarded to the log files
    /// 4. Probes the TCP port until it accepts connections
    ///
    /// If the process was spawned but never became ready, it is killed and
    /// reaped before the error is returned.
    pub async fn start(self, port: u16) -> Result<MongodProcess, MongodError> {
        let mongod_path = self.resolve_binary(MONGOD_BINARY)?;
        self.check_version(&mongod_path).await?;

        let port = if port == 0 {
            allocate_free_port()?
        } else {
            port
        };

        let data_dir = tempfile::Builder::new()
            .prefix(DATA_DIR_PREFIX)
            .tempdir()
            .map_err(|source| MongodError::CreateDataDir { source })?;

        let log_dir = self.log_dir.clone().unwrap_or_else(std::env::temp_dir);
        let stdout_sink = OutputSink::new_in(&log_dir, STDOUT_FILE_PREFIX)
            .map(Arc::new)
            .map_err(MongodError::OutputCapture)?;
        let stderr_sink = OutputSink::new_in(&log_dir, STDERR_FILE_PREFIX)
            .map(Arc::new)
            .map_err(MongodError::OutputCapture)?;

        tracing::info!(
            port,
            data_dir = %data_dir.path().display(),
            mongod = %mongod_path.display(),
            "Starting mongod"
        );

        let mut cmd = Command::new(&mongod_path);
        cmd.arg("--port")
            .arg(port.to_string())
            .arg("--bind_ip")
            .arg(LOOPBACK_ADDR)
            .arg("--dbpath")
            .arg(data_dir.path());
        for feature in self.version.features() {
            cmd.args(feature.args());
        }

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(!self.wait_for_exit)
            .spawn()
            .map_err(|source| MongodError::StartFailed { source })?;

        // Forwarding tasks terminate on their own when the child exits (EOF on pipes)
        let stdout_log_task = child.stdout.take().map(|stdout| {
            forward_output(stdout, Arc::clone(&stdout_sink), OutputStream::Stdout)
        });
        let stderr_log_task = child.stderr.take().map(|stderr| {
            forward_output(stderr, Arc::clone(&stderr_sink), OutputStream::Stderr)
        });

        let (data_dir, data_dir_path) = if self.keep_data_dir {
            (None, data_dir.keep())
        } else {
            let path = data_dir.path().to_path_buf();
            (Some(data_dir), path)
        };

        let mut process = MongodProcess {
            child,
            port,
            data_dir,
            data_dir_path,
            stdout_sink,
            stderr_sink,
            stdout_log_task,
            stderr_log_task,
            wait_for_exit: self.wait_for_exit,
        };

        process.wait_for_ready(self.readiness_timeout).await?;

        tracing::info!(
            port,
            pid = process.pid(),
            url = %process.connection_url(),
            "mongod ready"
        );

        Ok(process)
    }

    /// Runs `mongod --version` and compares the reported version to the pin.
    async fn check_version(&self, mongod_path: &Path) -> Result<(), MongodError> {
        let output = Command::new(mongod_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MongodError::VersionCheckFailed { source })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(found) = parse_reported_version(&stdout) else {
            return Err(MongodError::VersionUnknown {
                output: stdout.trim().to_string(),
            });
        };

        if !self.version.matches(&found) {
            return Err(MongodError::VersionMismatch {
                expected: self.version.version().to_string(),
                found,
            });
        }

        tracing::info!(version = %found, pinned = %self.version.version(), "mongod version");
        Ok(())
    }
}

/// Extracts `X.Y.Z` from the `db version vX.Y.Z` line of `mongod --version`.
fn parse_reported_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("db version v")?;
        let version = rest.split_whitespace().next()?;
        (!version.is_empty()).then(|| version.to_string())
    })
}

/// Which pipe a forwarding task reads from.
#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Spawns a task copying `reader` line by line into `sink` and to tracing.
///
/// Lines are forwarded as raw bytes; invalid UTF-8 is replaced only in the
/// tracing copy. The sink is closed when the pipe reaches EOF or fails.
fn forward_output<R>(
    reader: R,
    sink: Arc<OutputSink>,
    stream: OutputStream,
) -> JoinHandle<Result<(), OutputSinkError>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(source) => {
                    if let Err(err) = sink.on_processed() {
                        tracing::warn!(error = %err, "Failed to close mongod output file");
                    }
                    return Err(OutputSinkError::Read { source });
                }
            }

            if !line.ends_with(b"\n") {
                line.push(b'\n');
            }
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            match stream {
                OutputStream::Stdout => tracing::debug!(target: "mongod", "{}", text),
                OutputStream::Stderr => tracing::warn!(target: "mongod", "{}", text),
            }
            sink.process_bytes(&line)?;
        }
        sink.on_processed()
    })
}

/// A running `mongod` server process.
///
/// Created by [`MongodBuilder::start`]. Call [`stop`](Self::stop) to shut it
/// down; dropping the value without stopping falls back to a blocking
/// shutdown in [`Drop`].
pub struct MongodProcess {
    /// The mongod server child process
    child: Child,
    /// Loopback port the server listens on
    port: u16,
    /// Temporary `--dbpath`, `None` when kept on disk
    data_dir: Option<tempfile::TempDir>,
    data_dir_path: PathBuf,
    stdout_sink: Arc<OutputSink>,
    stderr_sink: Arc<OutputSink>,
    stdout_log_task: Option<JoinHandle<Result<(), OutputSinkError>>>,
    stderr_log_task: Option<JoinHandle<Result<(), OutputSinkError>>>,
    /// See [`MongodBuilder::wait_for_exit`].
    wait_for_exit: bool,
}

impl std::fmt::Debug for MongodProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongodProcess")
            .field("pid", &self.child.id())
            .field("port", &self.port)
            .field("data_dir", &self.data_dir_path)
            .finish_non_exhaustive()
    }
}

impl MongodProcess {
    /// Loopback port the server listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// OS process id, `None` once the process has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Connection string for this instance.
    pub fn connection_url(&self) -> String {
        connection_url(self.port)
    }

    /// The `--dbpath` directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir_path
    }

    /// Log file receiving the server's stdout.
    pub fn stdout_log(&self) -> &Path {
        self.stdout_sink.path()
    }

    /// Log file receiving the server's stderr.
    pub fn stderr_log(&self) -> &Path {
        self.stderr_sink.path()
    }

    /// Waits for the port to accept TCP connections.
    ///
    /// Connects with exponential backoff via the `backon` crate under an
    /// overall deadline, racing the probe against child exit so a crashed
    /// server is reported immediately instead of after the timeout.
    async fn wait_for_ready(&mut self, timeout: Duration) -> Result<(), MongodError> {
        let port = self.port;
        let start = std::time::Instant::now();

        tracing::debug!(
            port,
            timeout_ms = timeout.as_millis() as u64,
            "Waiting for mongod to accept connections"
        );

        let probe = tokio::time::timeout(timeout, async move {
            (|| async move { tokio::net::TcpStream::connect((LOOPBACK_ADDR, port)).await })
                .retry(
                    ExponentialBuilder::default()
                        .with_min_delay(Duration::from_millis(50))
                        .with_max_delay(Duration::from_secs(1))
                        .with_max_times(600),
                )
                .notify(|err, dur| {
                    tracing::trace!(
                        error = %err,
                        retry_after_ms = dur.as_millis() as u64,
                        "mongod port not ready, retrying"
                    );
                })
                .await
                // Drop the stream, it only confirmed connectivity
                .map(|_stream| ())
        });

        let probe_result = tokio::select! {
            status = self.child.wait() => {
                let status = status.map_err(|source| MongodError::StartFailed { source })?;
                tracing::error!(status = ?status, "mongod exited before accepting connections");
                return Err(MongodError::UnexpectedExit {
                    status: status.code(),
                    stderr_log: self.stderr_sink.path().to_path_buf(),
                });
            }
            result = probe => result,
        };

        match probe_result {
            Ok(Ok(())) => {
                tracing::debug!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "mongod is accepting connections"
                );
                Ok(())
            }
            Ok(Err(_)) | Err(_) => {
                tracing::warn!(port, "mongod did not become ready, killing it");
                let _ = self.child.kill().await;
                // Reap the killed child to prevent zombie process
                let _ = self.child.wait().await;
                Err(MongodError::ReadinessTimeout {
                    port,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Waits for the child process to exit.
    ///
    /// Intended for a `tokio::select!` branch detecting unexpected exits.
    pub async fn wait_child(&mut self) -> Result<std::process::ExitStatus, std::io::Error> {
        self.child.wait().await
    }

    /// Shuts the server down and releases its resources.
    ///
    /// Sends SIGTERM and waits for the process to exit, escalating to SIGKILL
    /// after a timeout. Then waits for the output forwarding tasks, closes
    /// both log files, and removes the temporary data directory (unless it
    /// was configured to be kept).
    pub async fn stop(mut self) -> Result<(), MongodError> {
        tracing::info!(
            port = self.port,
            pid = self.child.id(),
            "Shutting down mongod"
        );

        #[cfg(unix)]
        if let Some(pid) = self.child.id().and_then(nix_pid) {
            let signal = nix::sys::signal::Signal::SIGTERM;
            if let Err(err) = nix::sys::signal::kill(pid, signal) {
                tracing::warn!(%pid, %signal, error = %err, "Failed to send signal to mongod");
            }
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(status = ?status, "mongod shut down");
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Error waiting for mongod to exit");
                return Err(MongodError::ShutdownFailed { source: err });
            }
            Err(_) => {
                // Timeout, force kill via native tokio API (sends SIGKILL)
                tracing::warn!("mongod shutdown timed out, forcing kill");
                self.child
                    .kill()
                    .await
                    .map_err(|source| MongodError::ShutdownFailed { source })?;
                // Reap the killed child to prevent zombie process
                let _ = self.child.wait().await;
            }
        }

        self.drain_output().await?;

        if let Some(data_dir) = self.data_dir.take() {
            data_dir
                .close()
                .map_err(|source| MongodError::RemoveDataDir { source })?;
            tracing::debug!(data_dir = %self.data_dir_path.display(), "Removed mongod data directory");
        } else {
            tracing::info!(data_dir = %self.data_dir_path.display(), "Keeping mongod data directory");
        }

        Ok(())
    }

    /// Waits for the forwarding tasks to flush the remaining output, then
    /// closes both sinks.
    async fn drain_output(&mut self) -> Result<(), MongodError> {
        let tasks = [self.stdout_log_task.take(), self.stderr_log_task.take()];
        for task in tasks.into_iter().flatten() {
            let abort = task.abort_handle();
            match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, task).await {
                Ok(Ok(result)) => result.map_err(MongodError::OutputCapture)?,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "mongod output forwarding task failed");
                }
                Err(_) => {
                    tracing::warn!("mongod output forwarding did not finish, aborting");
                    abort.abort();
                }
            }
        }

        self.stdout_sink
            .on_processed()
            .map_err(MongodError::OutputCapture)?;
        self.stderr_sink
            .on_processed()
            .map_err(MongodError::OutputCapture)?;
        Ok(())
    }

    /// Aborts the stdout/stderr forwarding tasks if they are still running.
    fn abort_log_tasks(&mut self) {
        if let Some(handle) = self.stdout_log_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.stderr_log_task.take() {
            handle.abort();
        }
    }

    /// Blocking shutdown for the Drop safety net.
    ///
    /// Sends SIGINT then polls waitpid with WNOHANG so mongod can release its
    /// data files. On timeout, escalates to SIGKILL.
    ///
    /// Happy path: when [`stop`](Self::stop) already ran, `child.id()`
    /// returns `None` (tokio already reaped) and we return immediately.
    #[cfg(unix)]
    fn shutdown_blocking(&mut self) {
        use nix::sys::{
            signal::{Signal, kill},
            wait::{WaitPidFlag, WaitStatus, waitpid},
        };

        let Some(pid) = self.child.id().and_then(nix_pid) else {
            return;
        };

        if kill(pid, Signal::SIGINT).is_err() {
            return; // process already gone
        }

        // Poll waitpid(WNOHANG): 100 iterations × 100 ms = 10 s timeout.
        for _ in 0..100 {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => std::thread::sleep(Duration::from_millis(100)),
                // Exited, signaled, or not our child anymore
                _ => return,
            }
        }

        tracing::warn!(%pid, "mongod did not exit within 10 s after SIGINT in Drop, sending SIGKILL");
        let _ = kill(pid, Signal::SIGKILL);

        for _ in 0..5 {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => std::thread::sleep(Duration::from_millis(100)),
                _ => return,
            }
        }
        // Give up, tokio's orphan queue handles the rest.
    }

    #[cfg(not(unix))]
    fn shutdown_blocking(&mut self) {
        let _ = self.child.start_kill();
    }
}

impl Drop for MongodProcess {
    fn drop(&mut self) {
        self.abort_log_tasks();
        if self.wait_for_exit {
            self.shutdown_blocking();
        }
        for sink in [&self.stdout_sink, &self.stderr_sink] {
            if let Err(err) = sink.on_processed() {
                tracing::warn!(path = %sink.path().display(), error = %err, "Failed to close mongod output file");
            }
        }
    }
}

/// Converts an OS process id to a `nix` pid.
///
/// Returns `None` for pids outside the `i32` range, which no supported
/// platform hands out.
#[cfg(unix)]
fn nix_pid(pid: u32) -> Option<nix::unistd::Pid> {
    i32::try_from(pid).ok().map(nix::unistd::Pid::from_raw)
}

/// Connection string for a `mongod` listening on the loopback `port`.
///
/// `directConnection=true` keeps the driver from attempting replica set
/// discovery against the standalone server.
pub fn connection_url(port: u16) -> String {
    format!("mongodb://{LOOPBACK_ADDR}:{port}/?directConnection=true")
}

/// Picks a currently free loopback port by binding an ephemeral listener.
pub fn allocate_free_port() -> Result<u16, MongodError> {
    let listener = std::net::TcpListener::bind((LOOPBACK_ADDR, 0))
        .map_err(|source| MongodError::AllocatePort { source })?;
    let port = listener
        .local_addr()
        .map_err(|source| MongodError::AllocatePort { source })?
        .port();
    Ok(port)
}

/// Errors that can occur during `mongod` process management.
#[derive(Debug, thiserror::Error)]
pub enum MongodError {
    /// The `mongod` binary was not found
    ///
    /// Either it is not installed, its directory is not in PATH, or the
    /// configured `bin_path` does not contain it.
    #[error("mongod binary '{name}' not found")]
    BinaryNotFound { name: String },

    /// Running `mongod --version` failed
    #[error("Failed to run mongod --version")]
    VersionCheckFailed {
        #[source]
        source: std::io::Error,
    },

    /// `mongod --version` did not report a recognizable version
    #[error("Cannot determine mongod version from output: {output}")]
    VersionUnknown { output: String },

    /// The installed binary does not match the pinned version
    #[error("mongod version {found} does not match pinned version {expected}")]
    VersionMismatch { expected: String, found: String },

    /// No free port could be allocated
    #[error("Failed to allocate a free port")]
    AllocatePort {
        #[source]
        source: std::io::Error,
    },

    /// The temporary data directory could not be created
    #[error("Failed to create mongod data directory")]
    CreateDataDir {
        #[source]
        source: std::io::Error,
    },

    /// Capturing stdout/stderr into the log files failed
    #[error("Failed to capture mongod output")]
    OutputCapture(#[source] OutputSinkError),

    /// The `mongod` process could not be spawned
    #[error("Failed to start mongod")]
    StartFailed {
        #[source]
        source: std::io::Error,
    },

    /// The server did not accept connections in time
    #[error("mongod on port {port} failed to become ready within {timeout_ms} ms")]
    ReadinessTimeout { port: u16, timeout_ms: u64 },

    /// The server exited while it was expected to be running
    #[error("mongod exited unexpectedly with status {status:?}, see {}", stderr_log.display())]
    UnexpectedExit {
        status: Option<i32>,
        stderr_log: PathBuf,
    },

    /// The server could not be stopped
    #[error("Failed to shut down mongod")]
    ShutdownFailed {
        #[source]
        source: std::io::Error,
    },

    /// The temporary data directory could not be removed
    #[error("Failed to remove mongod data directory")]
    RemoveDataDir {
        #[source]
        source: std::io::Error,
    },
}
