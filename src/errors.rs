//! Typed errors for the invocation engine.
//!
//! `InvocationError` covers everything that can go wrong between preparing the
//! results directory and handing back an `ExecutionReport`. Configuration
//! problems are reported separately (see `validation`) and never reach here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing, running, or transporting a runner invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Command line is empty")]
    EmptyCommand,

    #[error("Failed to spawn runner '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Runner {0} was not captured")]
    StreamUnavailable(&'static str),

    #[error("Failed to read runner {stream}: {source}")]
    StreamRead {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for runner process: {0}")]
    WaitFailed(#[source] std::io::Error),

    #[error("Failed to prepare results directory {path}: {source}")]
    ResultsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to talk to worker '{worker}': {source}")]
    WorkerIo {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker '{worker}' exited with code {exit_code}: {stderr}")]
    WorkerFailed {
        worker: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Worker protocol error: {0}")]
    WorkerProtocol(String),

    #[error("Worker reported an error: {0}")]
    Remote(String),
}
