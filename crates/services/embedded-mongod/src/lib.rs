//! Embedded MongoDB server for integration tests
//!
//! This crate supervises a local `mongod` process: it checks the installed
//! engine against a pinned version, starts it on a loopback port with a
//! throwaway data directory, waits until it accepts connections, captures its
//! output into temporary log files, and shuts it down again.
//!
//! # Prerequisites
//!
//! A `mongod` binary must be available in PATH or in the directory passed to
//! [`MongodBuilder::bin_path`].
//!
//! # Example
//!
//! ```ignore
//! use embedded_mongod::MongodBuilder;
//!
//! let process = MongodBuilder::new().start(0).await?;
//! println!("mongod listening on {}", process.connection_url());
//! println!("stdout captured in {}", process.stdout_log().display());
//!
//! process.stop().await?;
//! ```
//!
//! # Output capture
//!
//! stdout and stderr are written to `mongod-*.log` and `mongod-error-*.log`
//! files (see [`OutputSink`]). The files are created before the process is
//! spawned and are kept after it stops.

mod mongod;
mod output;

pub use self::{
    mongod::{
        DEFAULT_MONGOD_VERSION, Feature, LOOPBACK_ADDR, MongodBuilder, MongodError,
        MongodProcess, MongodVersion, allocate_free_port, connection_url,
    },
    output::{OutputSink, OutputSinkError},
};
