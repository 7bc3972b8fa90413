//! Error types for the chain log

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the chain writer and verifier
#[derive(Debug, Error)]
pub enum ChainError {
    /// Underlying I/O failure on the log file
    #[error("I/O error on chain log: {0}")]
    Io(#[from] std::io::Error),

    /// The durable write completed but exceeded its deadline; the append was
    /// rolled back and chain state was not advanced
    #[error("durable write exceeded the {timeout_ms} ms deadline")]
    WriteTimeout { timeout_ms: u64 },

    /// The log file does not exist; distinct from an empty-but-valid chain
    #[error("chain log not found at {0}")]
    ChainAbsent(PathBuf),

    /// Verification found the first point of divergence; terminal, never
    /// auto-repaired
    #[error("chain broken at sequence {sequence}: {reason}")]
    ChainBroken { sequence: u64, reason: String },

    /// An existing log ends in an entry the writer cannot parse; refusing to
    /// start a fresh chain over it
    #[error("existing log has a malformed tail: {0}")]
    MalformedTail(String),
}

/// Errors from decoding a single persisted log line
#[derive(Debug, Error)]
pub enum LineError {
    #[error("expected 14 comma-separated fields, found {found}")]
    FieldCount { found: usize },

    #[error("unparseable sequence number {0:?}")]
    BadSequence(String),

    #[error("unparseable timestamp {0:?}")]
    BadTimestamp(String),

    #[error("unknown event type {0:?}")]
    BadEventType(String),

    #[error("unknown activity label {0:?}")]
    BadActivity(String),

    #[error("unparseable {field} value {value:?}")]
    BadNumber { field: &'static str, value: String },

    #[error("location fields must all be present or all be empty")]
    PartialLocation,

    #[error("{field} is not a 64-character lowercase hex digest")]
    BadDigest { field: &'static str },
}
