//! Chained log entries and the entry-hash function
//!
//! `entry_hash = SHA256(prev_hash_hex || canonical_record_text || sequence_decimal)`
//!
//! Both digests are stored in the line as explicit fields so the verifier can
//! check linkage field-by-field, not only by recomputation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LineError;
use crate::record::EventRecord;

/// `prev_hash` of entry 0: hex encoding of 32 zero bytes
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Fixed header line of the persisted log
pub const LOG_HEADER: &str = "sequence_number,timestamp,event_type,duration_ms,avg_delta_pa,activity,vibration_magnitude,audio_level,dust_density,lat,lon,alt,prev_hash,entry_hash";

/// Number of comma-separated fields in one entry line
const FIELD_COUNT: usize = 14;

/// Compute the hash linking an entry to its predecessor
pub fn compute_entry_hash(prev_hash: &str, canonical_record: &str, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(canonical_record.as_bytes());
    hasher.update(sequence.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// One persisted, chained line of the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sequence: u64,
    pub record: EventRecord,
    /// `entry_hash` of the previous entry, or [`GENESIS_HASH`] at sequence 0
    pub prev_hash: String,
    pub entry_hash: String,
}

impl LogEntry {
    /// Render the full line as persisted (no trailing newline)
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.sequence,
            self.record.canonical_fields(),
            self.prev_hash,
            self.entry_hash
        )
    }

    /// Decode one stored line
    ///
    /// Returns the entry together with the raw canonical record text exactly
    /// as it appeared on disk; verification hashes that text, never a
    /// re-rendering of the parsed record.
    pub fn parse_line(line: &str) -> Result<(Self, String), LineError> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != FIELD_COUNT {
            return Err(LineError::FieldCount {
                found: fields.len(),
            });
        }

        let sequence = fields[0]
            .parse::<u64>()
            .map_err(|_| LineError::BadSequence(fields[0].to_string()))?;
        let record = EventRecord::from_canonical_fields(&fields[1..12])?;
        let prev_hash = parse_digest("prev_hash", fields[12])?;
        let entry_hash = parse_digest("entry_hash", fields[13])?;

        let canonical = fields[1..12].join(",");

        Ok((
            Self {
                sequence,
                record,
                prev_hash,
                entry_hash,
            },
            canonical,
        ))
    }
}

fn parse_digest(field: &'static str, value: &str) -> Result<String, LineError> {
    let valid = value.len() == 64
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
        Ok(value.to_string())
    } else {
        Err(LineError::BadDigest { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn heartbeat_entry() -> LogEntry {
        let record = EventRecord::heartbeat(Utc.with_ymd_and_hms(2025, 11, 11, 1, 14, 0).unwrap());
        let canonical = record.canonical_fields();
        let entry_hash = compute_entry_hash(GENESIS_HASH, &canonical, 0);
        LogEntry {
            sequence: 0,
            record,
            prev_hash: GENESIS_HASH.to_string(),
            entry_hash,
        }
    }

    #[test]
    fn test_entry_hash_is_deterministic() {
        let a = compute_entry_hash(GENESIS_HASH, "x,y,z", 7);
        let b = compute_entry_hash(GENESIS_HASH, "x,y,z", 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_entry_hash_covers_every_input() {
        let base = compute_entry_hash(GENESIS_HASH, "x,y,z", 7);
        assert_ne!(base, compute_entry_hash(GENESIS_HASH, "x,y,w", 7));
        assert_ne!(base, compute_entry_hash(GENESIS_HASH, "x,y,z", 8));
        let other_prev = compute_entry_hash(GENESIS_HASH, "other", 0);
        assert_ne!(base, compute_entry_hash(&other_prev, "x,y,z", 7));
    }

    #[test]
    fn test_line_round_trip() {
        let entry = heartbeat_entry();
        let line = entry.to_line();
        let (parsed, canonical) = LogEntry::parse_line(&line).unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(canonical, entry.record.canonical_fields());
    }

    #[test]
    fn test_truncated_line_rejected() {
        let entry = heartbeat_entry();
        let line = entry.to_line();
        let cut = &line[..line.len() - 20];
        assert!(LogEntry::parse_line(cut).is_err());
    }

    #[test]
    fn test_uppercase_digest_rejected() {
        let entry = heartbeat_entry();
        let line = entry.to_line().replace(&entry.entry_hash, &entry.entry_hash.to_uppercase());
        assert!(matches!(
            LogEntry::parse_line(&line),
            Err(LineError::BadDigest { field: "entry_hash" })
        ));
    }
}
