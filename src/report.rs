/*!
 * Offline log analysis
 *
 * Consumes a VERIFIED chain log and summarizes it: attack totals, average
 * duration, average pressure drop, and the activity breakdown. Refuses to
 * analyze a log that fails verification; a summary over tampered evidence
 * is worse than no summary.
 */

use std::collections::HashMap;
use std::path::Path;

use comfy_table::{presets, Cell, Color, ContentArrangement, Table};

use chronos_core_chain::{verifier, ActivityLabel, ChainError, ChainReport, EventKind, LogEntry};

use crate::error::Result;

/// Aggregated statistics over a verified log
#[derive(Debug, Clone, PartialEq)]
pub struct LogSummary {
    pub chain: ChainReport,
    pub attack_count: u64,
    pub avg_duration_ms: Option<f64>,
    pub avg_delta_pa: Option<f64>,
    pub activity_counts: HashMap<Option<ActivityLabel>, u64>,
}

impl LogSummary {
    /// Activity label most often seen during attacks, ties broken towards
    /// the more active label
    pub fn most_common_activity(&self) -> Option<ActivityLabel> {
        // max_by_key keeps the last maximum, so ordering least-active first
        // breaks ties towards the more active label.
        [
            ActivityLabel::Still,
            ActivityLabel::LowActivity,
            ActivityLabel::Moving,
        ]
        .into_iter()
        .filter(|label| self.activity_counts.get(&Some(*label)).copied().unwrap_or(0) > 0)
        .max_by_key(|label| self.activity_counts.get(&Some(*label)).copied().unwrap_or(0))
    }
}

/// Verify the log, then summarize it
///
/// Any chain failure propagates unchanged; analysis never proceeds over an
/// unverified log. The file is read once so verification and summary cover
/// the same bytes even if the log is appended to concurrently.
pub fn summarize_log(path: impl AsRef<Path>) -> Result<LogSummary> {
    let path = path.as_ref();
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ChainError::ChainAbsent(path.to_path_buf()).into())
        }
        Err(e) => return Err(e.into()),
    };
    let chain = verifier::verify_contents(&contents)?;
    let entries = verifier::read_entries(&contents)?;
    Ok(summarize_entries(chain, &entries))
}

fn summarize_entries(chain: ChainReport, entries: &[LogEntry]) -> LogSummary {
    let attacks: Vec<_> = entries
        .iter()
        .map(|e| &e.record)
        .filter(|r| r.kind == EventKind::AirRapierAttack)
        .collect();

    let attack_count = attacks.len() as u64;
    let mut activity_counts = HashMap::new();
    for record in &attacks {
        *activity_counts.entry(record.activity).or_insert(0u64) += 1;
    }

    let (avg_duration_ms, avg_delta_pa) = if attacks.is_empty() {
        (None, None)
    } else {
        let n = attacks.len() as f64;
        (
            Some(attacks.iter().map(|r| r.duration_ms as f64).sum::<f64>() / n),
            Some(attacks.iter().map(|r| r.avg_delta_pa).sum::<f64>() / n),
        )
    };

    LogSummary {
        chain,
        attack_count,
        avg_duration_ms,
        avg_delta_pa,
        activity_counts,
    }
}

/// Render the summary as a CLI table
pub fn summary_table(summary: &LogSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Attack Log Summary").fg(Color::Cyan),
        Cell::new(""),
    ]);

    table.add_row(vec![
        Cell::new("Chain entries"),
        Cell::new(summary.chain.entries.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Heartbeats"),
        Cell::new(summary.chain.heartbeats.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Attacks logged"),
        Cell::new(summary.attack_count.to_string()).fg(Color::Red),
    ]);

    if let Some(avg) = summary.avg_duration_ms {
        table.add_row(vec![
            Cell::new("Average duration"),
            Cell::new(format!("{:.1} ms", avg)),
        ]);
    }
    if let Some(avg) = summary.avg_delta_pa {
        table.add_row(vec![
            Cell::new("Average pressure drop"),
            Cell::new(format!("{:.1} Pa", avg)),
        ]);
    }
    if let Some(label) = summary.most_common_activity() {
        table.add_row(vec![
            Cell::new("Most common activity"),
            Cell::new(label.as_str()),
        ]);
    }

    for label in [
        ActivityLabel::Still,
        ActivityLabel::LowActivity,
        ActivityLabel::Moving,
    ] {
        if let Some(count) = summary.activity_counts.get(&Some(label)) {
            table.add_row(vec![
                Cell::new(format!("  attacks while {}", label.as_str())),
                Cell::new(count.to_string()),
            ]);
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chronos_core_chain::{ChainWriter, EventRecord, FusionData};
    use std::time::Duration;
    use tempfile::TempDir;

    fn attack(sec: u32, duration_ms: u64, delta: f64, activity: ActivityLabel) -> EventRecord {
        let fusion = FusionData {
            vibration_magnitude: Some(2.0),
            activity: Some(activity),
            ..Default::default()
        };
        EventRecord::attack(
            Utc.with_ymd_and_hms(2025, 11, 11, 1, 14, sec).unwrap(),
            duration_ms,
            delta,
            fusion,
        )
    }

    fn build_log(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("log.csv");
        let mut writer = ChainWriter::open(&path, Duration::from_millis(500)).unwrap();
        writer
            .append(&EventRecord::heartbeat(
                Utc.with_ymd_and_hms(2025, 11, 11, 1, 14, 0).unwrap(),
            ))
            .unwrap();
        writer
            .append(&attack(6, 120, -180.5, ActivityLabel::Moving))
            .unwrap();
        writer
            .append(&attack(20, 280, -220.1, ActivityLabel::Moving))
            .unwrap();
        writer
            .append(&attack(40, 80, -160.0, ActivityLabel::Still))
            .unwrap();
        path
    }

    #[test]
    fn test_summary_over_valid_log() {
        let dir = TempDir::new().unwrap();
        let summary = summarize_log(build_log(&dir)).unwrap();

        assert_eq!(summary.attack_count, 3);
        assert_eq!(summary.chain.heartbeats, 1);
        assert!((summary.avg_duration_ms.unwrap() - 160.0).abs() < 1e-9);
        assert!((summary.avg_delta_pa.unwrap() - -186.866_666_666).abs() < 1e-6);
        assert_eq!(summary.most_common_activity(), Some(ActivityLabel::Moving));
    }

    #[test]
    fn test_refuses_tampered_log() {
        let dir = TempDir::new().unwrap();
        let path = build_log(&dir);

        let contents = std::fs::read_to_string(&path).unwrap();
        // Inflate the second attack's duration.
        let tampered = contents.replace(",280,", ",999,");
        assert_ne!(contents, tampered);
        std::fs::write(&path, tampered).unwrap();

        assert!(summarize_log(&path).is_err());
    }

    #[test]
    fn test_absent_log_reported_as_chain_absent() {
        let dir = TempDir::new().unwrap();
        let err = summarize_log(dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ChronosError::Chain(ChainError::ChainAbsent(_))
        ));
    }

    #[test]
    fn test_empty_log_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        drop(ChainWriter::open(&path, Duration::from_millis(500)).unwrap());

        let summary = summarize_log(&path).unwrap();
        assert_eq!(summary.attack_count, 0);
        assert_eq!(summary.avg_duration_ms, None);
        assert_eq!(summary.most_common_activity(), None);
    }

    #[test]
    fn test_table_renders() {
        let dir = TempDir::new().unwrap();
        let summary = summarize_log(build_log(&dir)).unwrap();
        let rendered = summary_table(&summary).to_string();
        assert!(rendered.contains("Attacks logged"));
        assert!(rendered.contains("Moving"));
    }
}
