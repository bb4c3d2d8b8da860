//! Error types for the conflict detector.
//!
//! Structured errors via `thiserror`, one enum per concern, matching the
//! taxonomy in spec.md §7: parser-transient errors are retried and only
//! become fatal once the retry budget is exhausted; parser-timeout and
//! unresolved-changed-unit cases are not represented as errors at all —
//! they are logged and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the persistence layer (4.A).
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record for '{path}': {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from shelling out to `git` (4.B). These are fatal per spec.md §7 —
/// the tool cannot recover partial merge state.
#[derive(Error, Debug)]
pub enum VcsError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {subcommand} exited with status {status}: {stderr}")]
    NonZeroExit {
        subcommand: String,
        status: i32,
        stderr: String,
    },

    #[error("git output for '{subcommand}' was not valid UTF-8")]
    InvalidUtf8 { subcommand: String },

    #[error("octopus merge of {heads:?} onto '{mainline}' could not be performed cleanly")]
    MergeFailed { mainline: String, heads: Vec<String> },
}

/// Errors from invoking `srcml` and parsing its XML output (4.C/4.F).
///
/// `Timeout` is intentionally not fatal when handled by callers: per
/// spec.md §7 a timed-out file is skipped with a warning, it just has to be
/// distinguishable from a genuine parse failure so the caller can choose.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("srcml failed to spawn: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("srcml exited non-zero after {retries} retries on '{path}'")]
    ExhaustedRetries { path: PathBuf, retries: u32 },

    #[error("srcml timed out on '{path}'")]
    Timeout { path: PathBuf },

    #[error("malformed XML from srcml for '{path}': {reason}")]
    MalformedXml { path: PathBuf, reason: String },
}

/// Top-level result alias used across library modules.
pub type IndexResult<T> = Result<T, IndexError>;
pub type VcsResult<T> = Result<T, VcsError>;
pub type ExtractResult<T> = Result<T, ExtractError>;
