//! Tamper-evident hash-chain logging for Chronos
//!
//! This crate implements the append-only attack log: each entry embeds a
//! SHA-256 digest of its predecessor, so any retroactive insertion, deletion,
//! or alteration breaks every subsequent hash. The writer and the offline
//! verifier share one canonical line format; the determinism of that format
//! is what makes verification an exact inverse of construction.
//!
//! The entry hash is computed as:
//! `SHA256(prev_hash_hex || canonical_record_text || sequence_decimal)`
//!
//! Entry 0 chains from a fixed genesis constant (the hex encoding of 32 zero
//! bytes).

pub mod entry;
pub mod error;
pub mod record;
pub mod verifier;
pub mod writer;

pub use entry::{compute_entry_hash, LogEntry, GENESIS_HASH, LOG_HEADER};
pub use error::ChainError;
pub use record::{ActivityLabel, EventKind, EventRecord, FusionData, Location};
pub use verifier::{verify_log, ChainReport};
pub use writer::ChainWriter;

/// Result type for chain operations
pub type Result<T> = std::result::Result<T, ChainError>;
