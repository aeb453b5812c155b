//! Capture of `mongod` stdout/stderr into temporary log files.
//!
//! Each captured stream gets its own [`OutputSink`]. The backing file is
//! created eagerly, so a broken temp directory is reported before the process
//! is spawned, but the write handle is only opened when the first block of
//! output arrives. Streams that never produce output leave an empty file.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;

/// Suffix shared by all output log files.
const LOG_FILE_SUFFIX: &str = ".log";

/// A subprocess stream redirected into a temporary log file.
///
/// The sink is shared between the task reading the pipe and the process
/// owner, which closes it at shutdown. All state transitions happen under a
/// single mutex, so concurrent writers open the file handle exactly once.
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    state: Mutex<SinkState>,
}

#[derive(Debug)]
enum SinkState {
    /// The file exists on disk but no handle has been opened yet.
    Pending,
    /// The write handle is open.
    Open(fs_err::File),
    /// The sink has been closed. Further writes are rejected.
    Closed,
}

impl OutputSink {
    /// Creates a sink backed by a new uniquely named file in the system temp
    /// directory, named `<prefix><random>.log`.
    pub fn new(prefix: &str) -> Result<Self, OutputSinkError> {
        Self::new_in(std::env::temp_dir(), prefix)
    }

    /// Creates a sink backed by a new uniquely named file inside `dir`.
    ///
    /// The file outlives the sink so the log can be inspected after the run.
    pub fn new_in(dir: impl AsRef<Path>, prefix: &str) -> Result<Self, OutputSinkError> {
        let path = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(LOG_FILE_SUFFIX)
            .tempfile_in(dir)
            .map_err(|source| OutputSinkError::Create { source })?
            .into_temp_path()
            .keep()
            .map_err(|err| OutputSinkError::Create { source: err.error })?;

        tracing::info!(path = %path.display(), "Created mongod output file");

        Ok(Self {
            path,
            state: Mutex::new(SinkState::Pending),
        })
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a block of output, opening the write handle on first use.
    pub fn process(&self, block: &str) -> Result<(), OutputSinkError> {
        self.process_bytes(block.as_bytes())
    }

    /// Appends raw output bytes, which need not be valid UTF-8.
    pub fn process_bytes(&self, block: &[u8]) -> Result<(), OutputSinkError> {
        let mut state = self.state.lock();

        if matches!(*state, SinkState::Pending) {
            let file = fs_err::File::create(&self.path)
                .map_err(|source| OutputSinkError::Open { source })?;
            *state = SinkState::Open(file);
        }

        let SinkState::Open(file) = &mut *state else {
            return Err(OutputSinkError::Closed {
                path: self.path.clone(),
            });
        };
        file.write_all(block)
            .map_err(|source| OutputSinkError::Write { source })
    }

    /// Closes the write handle if it was opened.
    ///
    /// Called when the subprocess stream reaches EOF and again at shutdown;
    /// closing an unopened or already closed sink is a no-op.
    pub fn on_processed(&self) -> Result<(), OutputSinkError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, SinkState::Closed) {
            SinkState::Open(mut file) => file
                .flush()
                .map_err(|source| OutputSinkError::Close { source }),
            SinkState::Pending | SinkState::Closed => Ok(()),
        }
    }
}

/// Errors raised while capturing subprocess output.
///
/// None of these are recoverable: there is no fallback sink.
#[derive(Debug, thiserror::Error)]
pub enum OutputSinkError {
    /// The temporary log file could not be created.
    #[error("Cannot create temporary output file")]
    Create {
        #[source]
        source: std::io::Error,
    },

    /// The log file could not be opened for writing.
    ///
    /// The underlying `fs_err` error includes the path.
    #[error("Cannot open output file for writing")]
    Open {
        #[source]
        source: std::io::Error,
    },

    /// Reading the process pipe failed.
    #[error("Cannot read process output")]
    Read {
        #[source]
        source: std::io::Error,
    },

    /// Writing a block of output failed.
    #[error("Cannot write to output file")]
    Write {
        #[source]
        source: std::io::Error,
    },

    /// Flushing the handle on close failed.
    #[error("Cannot close output file")]
    Close {
        #[source]
        source: std::io::Error,
    },

    /// Output arrived after the sink was closed.
    #[error("Output file '{path}' is already closed")]
    Closed { path: PathBuf },
}
