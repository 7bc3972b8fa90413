//! Offline forensic verification
//!
//! Single pass from sequence 0, the exact inverse of chain construction.
//! Verification halts at the FIRST divergence; any attempt to resync past a
//! break would defeat the tamper-evidence guarantee. The hash is recomputed
//! over the stored record text verbatim, so no formatting drift between
//! writer and verifier can masquerade as tampering (or hide it).

use std::path::Path;

use crate::entry::{compute_entry_hash, LogEntry, GENESIS_HASH, LOG_HEADER};
use crate::error::ChainError;
use crate::record::EventKind;
use crate::Result;

/// Result of a successful verification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// Number of verified entries
    pub entries: u64,
    /// Sequence number of the final entry; `None` for an empty chain
    pub tail_sequence: Option<u64>,
    /// `entry_hash` of the final entry, or the genesis constant when empty
    pub tail_hash: String,
    pub attacks: u64,
    pub heartbeats: u64,
}

impl ChainReport {
    fn empty() -> Self {
        Self {
            entries: 0,
            tail_sequence: None,
            tail_hash: GENESIS_HASH.to_string(),
            attacks: 0,
            heartbeats: 0,
        }
    }
}

/// Verify a persisted log end to end
///
/// Returns `Ok(ChainReport)` only when every entry links correctly from
/// genesis to tail. An absent file is `ChainAbsent` (the caller must not
/// treat "no log" as "valid log"). The first bad entry, including a line
/// truncated by power loss, yields `ChainBroken` at that sequence.
pub fn verify_log(path: impl AsRef<Path>) -> Result<ChainReport> {
    let path = path.as_ref();
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ChainError::ChainAbsent(path.to_path_buf()))
        }
        Err(e) => return Err(ChainError::Io(e)),
    };
    verify_contents(&contents)
}

/// Verify log contents already read into memory
pub fn verify_contents(contents: &str) -> Result<ChainReport> {
    let mut lines = contents.lines();
    match lines.next() {
        None => return Ok(ChainReport::empty()),
        Some(header) if header == LOG_HEADER => {}
        Some(_) => {
            return Err(ChainError::ChainBroken {
                sequence: 0,
                reason: "log does not start with the canonical header".to_string(),
            })
        }
    }

    let mut report = ChainReport::empty();
    let mut expected_prev = GENESIS_HASH.to_string();

    for (index, line) in lines.enumerate() {
        let expected_seq = index as u64;
        let broken = |reason: String| ChainError::ChainBroken {
            sequence: expected_seq,
            reason,
        };

        let (entry, canonical) =
            LogEntry::parse_line(line).map_err(|e| broken(e.to_string()))?;

        if entry.sequence != expected_seq {
            return Err(broken(format!(
                "sequence {} out of order (expected {})",
                entry.sequence, expected_seq
            )));
        }
        if entry.prev_hash != expected_prev {
            return Err(broken("prev_hash does not match the preceding entry".to_string()));
        }

        let recomputed = compute_entry_hash(&entry.prev_hash, &canonical, entry.sequence);
        if recomputed != entry.entry_hash {
            return Err(broken("entry_hash does not match its record".to_string()));
        }

        match entry.record.kind {
            EventKind::AirRapierAttack => report.attacks += 1,
            EventKind::Heartbeat => report.heartbeats += 1,
        }
        report.entries += 1;
        report.tail_sequence = Some(entry.sequence);
        report.tail_hash = entry.entry_hash.clone();
        expected_prev = entry.entry_hash;
    }

    Ok(report)
}

/// Parse all entries of an already-verified log
///
/// Intended for downstream analysis; callers must run [`verify_log`] first
/// and refuse to proceed on failure.
pub fn read_entries(contents: &str) -> Result<Vec<LogEntry>> {
    let mut entries = Vec::new();
    for (index, line) in contents.lines().skip(1).enumerate() {
        let (entry, _) = LogEntry::parse_line(line).map_err(|e| ChainError::ChainBroken {
            sequence: index as u64,
            reason: e.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EventRecord;
    use crate::writer::{ChainWriter, DEFAULT_WRITE_TIMEOUT};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, count: u32) -> std::path::PathBuf {
        let path = dir.path().join("log.csv");
        let mut writer = ChainWriter::open(&path, DEFAULT_WRITE_TIMEOUT).unwrap();
        for i in 0..count {
            let ts = Utc.with_ymd_and_hms(2025, 11, 11, 1, 14, i).unwrap();
            writer.append(&EventRecord::heartbeat(ts)).unwrap();
        }
        path
    }

    #[test]
    fn test_valid_chain_reports_tail() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, 5);

        let report = verify_log(&path).unwrap();
        assert_eq!(report.entries, 5);
        assert_eq!(report.tail_sequence, Some(4));
        assert_eq!(report.heartbeats, 5);
        assert_eq!(report.attacks, 0);
        assert_ne!(report.tail_hash, GENESIS_HASH);
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        // Opening the writer creates the header without appending.
        drop(ChainWriter::open(&path, DEFAULT_WRITE_TIMEOUT).unwrap());

        let report = verify_log(&path).unwrap();
        assert_eq!(report.entries, 0);
        assert_eq!(report.tail_sequence, None);
        assert_eq!(report.tail_hash, GENESIS_HASH);
    }

    #[test]
    fn test_absent_log_is_not_valid() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            verify_log(dir.path().join("missing.csv")),
            Err(ChainError::ChainAbsent(_))
        ));
    }

    #[test]
    fn test_deleted_entry_breaks_chain_at_gap() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, 4);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<&str> = contents.lines().collect();
        lines.remove(2); // drop entry 1
        std::fs::write(&path, lines.join("\n")).unwrap();

        match verify_log(&path) {
            Err(ChainError::ChainBroken { sequence, .. }) => assert_eq!(sequence, 1),
            other => panic!("expected ChainBroken, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_final_line_breaks_at_that_sequence() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, 3);

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, &contents[..contents.len() - 30]).unwrap();

        match verify_log(&path) {
            Err(ChainError::ChainBroken { sequence, .. }) => assert_eq!(sequence, 2),
            other => panic!("expected ChainBroken, got {:?}", other),
        }
    }
}
