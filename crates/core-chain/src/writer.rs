//! Append-only chain writer
//!
//! The writer exclusively owns the append cursor and the running chain state
//! (`last_hash`, `next_sequence`). Exactly one writer may exist per log file;
//! a second writer would fork the chain, so ownership is enforced by
//! construction rather than file locking.
//!
//! Durability contract: a line is written, flushed, and fsynced before the
//! chain state advances. Any failure rolls the file back to its pre-append
//! length so a retried append cannot produce a duplicate or forked entry.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::entry::{compute_entry_hash, LogEntry, GENESIS_HASH, LOG_HEADER};
use crate::error::ChainError;
use crate::record::EventRecord;
use crate::Result;

/// Default deadline for one durable append
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Append-only writer for one chain log file
pub struct ChainWriter {
    path: PathBuf,
    file: File,
    next_sequence: u64,
    last_hash: String,
    write_timeout: Duration,
}

impl ChainWriter {
    /// Open (or create) a chain log and recover its tail state
    ///
    /// An empty or absent file starts a fresh chain at sequence 0 with the
    /// genesis hash. An existing log seeds `next_sequence` and `last_hash`
    /// from its final entry; a tail the writer cannot parse is a hard error,
    /// because silently restarting the chain would bury the evidence that
    /// something went wrong.
    pub fn open(path: impl AsRef<Path>, write_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (next_sequence, last_hash, needs_header) = match std::fs::read_to_string(&path) {
            Ok(contents) => Self::recover_tail(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (0, GENESIS_HASH.to_string(), true)
            }
            Err(e) => return Err(ChainError::Io(e)),
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if needs_header {
            writeln!(file, "{}", LOG_HEADER)?;
            file.sync_all()?;
        }

        Ok(Self {
            path,
            file,
            next_sequence,
            last_hash,
            write_timeout,
        })
    }

    fn recover_tail(contents: &str) -> Result<(u64, String, bool)> {
        let mut lines = contents.lines();
        match lines.next() {
            None => return Ok((0, GENESIS_HASH.to_string(), true)),
            Some(header) if header == LOG_HEADER => {}
            Some(other) => {
                return Err(ChainError::MalformedTail(format!(
                    "unexpected header line {:?}",
                    other
                )))
            }
        }

        match lines.last() {
            None => Ok((0, GENESIS_HASH.to_string(), false)),
            Some(tail) => {
                let (entry, _) =
                    LogEntry::parse_line(tail).map_err(|e| ChainError::MalformedTail(e.to_string()))?;
                Ok((entry.sequence + 1, entry.entry_hash, false))
            }
        }
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number the next successful append will receive
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Hash the next entry will chain from
    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }

    /// Append one record as the next chained entry
    ///
    /// Returns the persisted entry once it is durable. On any write, flush,
    /// or sync failure the file is truncated back to its pre-append length
    /// and chain state is left untouched; the caller may retry on a later
    /// tick with the same record.
    pub fn append(&mut self, record: &EventRecord) -> Result<LogEntry> {
        let canonical = record.canonical_fields();
        let entry_hash = compute_entry_hash(&self.last_hash, &canonical, self.next_sequence);
        let entry = LogEntry {
            sequence: self.next_sequence,
            record: record.clone(),
            prev_hash: self.last_hash.clone(),
            entry_hash,
        };

        let pre_len = self.file.metadata()?.len();
        let started = Instant::now();

        let written = writeln!(self.file, "{}", entry.to_line())
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_all());

        if let Err(e) = written {
            self.rollback(pre_len);
            return Err(ChainError::Io(e));
        }

        if started.elapsed() > self.write_timeout {
            // The bytes are durable, but the bounded-write contract was
            // violated; remove the entry so chain state and file agree.
            self.rollback(pre_len);
            return Err(ChainError::WriteTimeout {
                timeout_ms: self.write_timeout.as_millis() as u64,
            });
        }

        self.last_hash = entry.entry_hash.clone();
        self.next_sequence += 1;
        Ok(entry)
    }

    fn rollback(&mut self, pre_len: u64) {
        // A failed truncate leaves a partial line; the verifier reports that
        // as ChainBroken at this sequence, which is the correct outcome for
        // a log this writer could not keep consistent.
        let _ = self.file.set_len(pre_len);
        let _ = self.file.sync_all();
    }
}
