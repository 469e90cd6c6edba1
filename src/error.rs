//! error.rs
//!
//! Error taxonomy, one enum per pipeline stage.
//!
//! Startup errors abort the whole run. Everything else is scoped to a
//! single source unit and ends that unit in `Failed`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::testgen::sandbox::StageOutput;

/// Transport-level failures talking to the generation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed stream chunk: {0}")]
    Stream(String),

    #[error("backend reported: {0}")]
    Remote(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to list models: {0}")]
    ListModels(#[source] BackendError),

    #[error("failed after {attempts} attempts across {backends} backend(s)")]
    Exhausted { attempts: usize, backends: usize },
}

/// Stage-tagged sandbox failure. Each variant keeps the captured
/// stdout/stderr of the step that broke.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox setup failed: {context}: {source}")]
    Setup {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("compilation failed ({})\n{}", .0.status_label(), .0.combined())]
    CompileFailed(StageOutput),

    #[error("tests failed ({})\n{}", .0.status_label(), .0.combined())]
    RunFailed(StageOutput),

    #[error("coverage tool failed ({})\n{}", .0.status_label(), .0.combined())]
    CoverageToolFailed(StageOutput),
}

impl SandboxError {
    pub fn stage(&self) -> &'static str {
        match self {
            SandboxError::Setup { .. } => "sandbox-setup",
            SandboxError::CompileFailed(_) => "compile-failed",
            SandboxError::RunFailed(_) => "run-failed",
            SandboxError::CoverageToolFailed(_) => "coverage-tool-failed",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CoverageError {
    /// The report did not contain a `Lines executed:X% of N` line.
    #[error("failed to parse coverage output: {0}")]
    Unparseable(String),

    #[error("coverage {percent:.2}% is below {threshold:.0}% threshold")]
    BelowThreshold { percent: f64, threshold: f64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid backend URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Fatal errors: the run stops before (or instead of) processing units.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to generation backend: {0}")]
    BackendUnreachable(#[source] BackendError),

    #[error("failed to read codebase {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
