//! Error types shared by the ledger, upload and run modules.
//!
//! Failures are scoped: [`LedgerError::CorruptState`] aborts the whole run,
//! everything else fails only the table being processed.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the identity ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Stored ledger exists but cannot be trusted
    #[error("ledger {} is corrupt: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    /// A dependent table asked for parent ids but the parent has none
    #[error("no existing rows in '{parent}' to reference")]
    NoReferenceableParent { parent: String },

    #[error("table '{table}' was already committed in this run")]
    AlreadyCommitted { table: String },

    #[error("id {id} already exists in table '{table}'")]
    IdCollision { table: String, id: u64 },

    /// Reserving more ids would overflow `u64`
    #[error("cannot reserve {count} more ids for '{table}' after {last_id}")]
    IdSpaceExhausted {
        table: String,
        last_id: u64,
        count: usize,
    },

    #[error("failed to {action} ledger {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while staging or transmitting a chunk
#[derive(Debug, Error)]
pub enum UploadError {
    /// Retryable store failure (network, throttling, 5xx)
    #[error("transient failure uploading {key}: {message}")]
    Transient { key: String, message: String },

    /// Non-retryable store failure (access denied, bad bucket, bad key)
    #[error("fatal failure uploading {key}: {message}")]
    Fatal { key: String, message: String },

    /// The key is already taken; objects are never overwritten
    #[error("refusing to overwrite existing object {key}")]
    AlreadyExists { key: String },

    /// Transient failures persisted past the retry bound
    #[error("giving up on {key} after {attempts} attempts: {message}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        message: String,
    },

    /// The chunk could not be written to a local columnar file
    #[error("failed to stage {key}: {message}")]
    Stage { key: String, message: String },
}

impl UploadError {
    /// Whether the same chunk may be sent again
    pub fn is_transient(&self) -> bool {
        matches!(self, UploadError::Transient { .. })
    }

    /// Object key the failure relates to
    pub fn key(&self) -> &str {
        match self {
            UploadError::Transient { key, .. }
            | UploadError::Fatal { key, .. }
            | UploadError::AlreadyExists { key }
            | UploadError::RetriesExhausted { key, .. }
            | UploadError::Stage { key, .. } => key,
        }
    }
}

/// Reason a single table ended in the `FAILED` state
#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot generate '{table}': {source}")]
    NoReferenceableParent {
        table: String,
        #[source]
        source: LedgerError,
    },

    #[error("record source returned {actual} rows for '{table}', expected {expected}")]
    RowCountMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("record source returned ids for '{table}' that differ from the reserved range")]
    IdMismatch { table: String },

    #[error("failed to size chunks for '{table}': {message}")]
    Chunking { table: String, message: String },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
