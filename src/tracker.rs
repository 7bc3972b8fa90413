/*!
 * Cooperative sampling loop
 *
 * Single-threaded: one fixed-rate timer drives sampling, and the detector,
 * fusion capture, and chain append all execute synchronously within the same
 * tick. A tick that overruns the sample period delays the next sample; no
 * concurrent ticks are ever in flight, and the tracker is the single owner
 * of the chain writer.
 *
 * A failed append leaves chain state untouched (the writer rolls the file
 * back) and parks the record for the next tick; there is no busy retry.
 * The heartbeat timer runs independent of detector state and of sensor
 * failures, so the log can distinguish "device offline" from "no attacks".
 */

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use chronos_core_chain::{ChainWriter, EventRecord};

use crate::config::ChronosConfig;
use crate::detector::Detector;
use crate::error::Result;
use crate::sensors::SensorHub;

pub struct Tracker {
    config: ChronosConfig,
    hub: SensorHub,
    detector: Detector,
    writer: ChainWriter,
    /// Records awaiting a durable append, oldest first
    pending: VecDeque<EventRecord>,
    last_heartbeat: Option<Instant>,
}

impl Tracker {
    /// Validate configuration, open (or resume) the chain log, and build the
    /// loop state. Fails fast on an inconsistent configuration.
    pub fn new(config: ChronosConfig, hub: SensorHub) -> Result<Self> {
        config.validate()?;
        let writer = ChainWriter::open(&config.log_path, config.write_timeout())?;
        let detector = Detector::new(&config);
        Ok(Self {
            config,
            hub,
            detector,
            writer,
            pending: VecDeque::new(),
            last_heartbeat: None,
        })
    }

    /// Sequence number of the next entry the chain will accept
    pub fn next_sequence(&self) -> u64 {
        self.writer.next_sequence()
    }

    /// Records still waiting on a durable append
    pub fn pending_appends(&self) -> usize {
        self.pending.len()
    }

    /// Execute one sampling tick
    pub fn tick(&mut self) {
        let snapshot = self.hub.sample();

        // The heartbeat timer is independent of the detector and must fire
        // even when every sensor channel failed this tick.
        let due = match self.last_heartbeat {
            None => true,
            Some(at) => at.elapsed() >= Duration::from_secs(self.config.heartbeat_interval_secs),
        };
        if due {
            self.last_heartbeat = Some(Instant::now());
            self.enqueue(EventRecord::heartbeat(snapshot.wall_clock));
        }

        if let Some(event) = self.detector.tick(&snapshot) {
            self.enqueue(event);
        }

        self.drain_pending();
    }

    /// Park a record for appending, evicting the oldest parked record when
    /// the queue is full so a dead card cannot grow memory without bound
    fn enqueue(&mut self, record: EventRecord) {
        if self.pending.len() >= self.config.max_pending_records {
            if let Some(dropped) = self.pending.pop_front() {
                warn!(
                    kind = dropped.kind.as_str(),
                    capacity = self.config.max_pending_records,
                    "pending queue full, dropping oldest unpersisted record"
                );
            }
        }
        self.pending.push_back(record);
    }

    /// Append queued records in order; stop at the first failure and leave
    /// the remainder for the next tick
    fn drain_pending(&mut self) {
        while let Some(record) = self.pending.front() {
            match self.writer.append(record) {
                Ok(entry) => {
                    debug!(sequence = entry.sequence, kind = entry.record.kind.as_str(), "entry appended");
                    self.pending.pop_front();
                }
                Err(e) => {
                    warn!(error = %e, pending = self.pending.len(), "append failed, will retry next tick");
                    break;
                }
            }
        }
    }

    /// Run the loop until `run_for` elapses, or forever when `None`
    ///
    /// The device normally runs until power-off; the bounded form exists for
    /// demos and tests.
    pub fn run(&mut self, run_for: Option<Duration>) -> Result<()> {
        let period = self.config.sample_period();
        let started = Instant::now();

        loop {
            let tick_started = Instant::now();
            self.tick();

            if let Some(limit) = run_for {
                if started.elapsed() >= limit {
                    break;
                }
            }

            let elapsed = tick_started.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{FixedLocation, FixedScalar, ScriptedPressurePair, SensorHub};
    use chronos_core_chain::{verify_log, EventKind, LogEntry};
    use tempfile::TempDir;

    fn test_hub(deltas: Vec<f64>) -> SensorHub {
        SensorHub::new(
            Box::new(ScriptedPressurePair::from_deltas(deltas)),
            Box::new(FixedScalar(3.2)),
            Box::new(FixedScalar(0.41)),
            Box::new(FixedScalar(0.08)),
            Box::new(FixedLocation::none()),
        )
    }

    fn test_config(dir: &TempDir) -> ChronosConfig {
        ChronosConfig {
            log_path: dir.path().join("log.csv"),
            heartbeat_interval_secs: 3600, // only the startup heartbeat fires
            ..Default::default()
        }
    }

    fn read_entries(path: &std::path::Path) -> Vec<LogEntry> {
        let contents = std::fs::read_to_string(path).unwrap();
        chronos_core_chain::verifier::read_entries(&contents).unwrap()
    }

    #[test]
    fn test_startup_heartbeat_is_entry_zero() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let path = config.log_path.clone();

        let mut tracker = Tracker::new(config, test_hub(vec![0.0; 5])).unwrap();
        for _ in 0..5 {
            tracker.tick();
        }

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sequence, 0);
        assert_eq!(entries[0].record.kind, EventKind::Heartbeat);
    }

    #[test]
    fn test_attack_flows_into_verified_chain() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let path = config.log_path.clone();

        let mut deltas = vec![0.0; 3];
        deltas.extend([-200.0; 6]);
        deltas.extend([0.0; 3]);
        let tick_count = deltas.len();

        let mut tracker = Tracker::new(config, test_hub(deltas)).unwrap();
        for _ in 0..tick_count {
            tracker.tick();
        }
        assert_eq!(tracker.pending_appends(), 0);

        let report = verify_log(&path).unwrap();
        assert_eq!(report.attacks, 1);
        assert_eq!(report.heartbeats, 1);

        let entries = read_entries(&path);
        let attack = &entries[1].record;
        assert_eq!(attack.kind, EventKind::AirRapierAttack);
        assert!((attack.avg_delta_pa - -200.0).abs() < 1e-9);
        assert_eq!(attack.vibration_magnitude, Some(3.2));
    }

    #[test]
    fn test_rejects_invalid_config_at_startup() {
        let dir = TempDir::new().unwrap();
        let config = ChronosConfig {
            log_path: dir.path().join("log.csv"),
            attack_threshold_pa: 50.0,
            attack_end_threshold_pa: 150.0,
            ..Default::default()
        };
        assert!(Tracker::new(config, test_hub(vec![])).is_err());
    }

    #[test]
    fn test_failed_append_parks_record_and_preserves_chain() {
        let dir = TempDir::new().unwrap();
        // A zero deadline makes every durable append miss it.
        let config = ChronosConfig {
            write_timeout_ms: 0,
            ..test_config(&dir)
        };
        let path = config.log_path.clone();

        let mut tracker = Tracker::new(config, test_hub(vec![0.0; 4])).unwrap();
        for _ in 0..4 {
            tracker.tick();
        }

        // The startup heartbeat is parked, chain state never advanced, and
        // the rolled-back file still verifies as an empty chain.
        assert_eq!(tracker.pending_appends(), 1);
        assert_eq!(tracker.next_sequence(), 0);
        let report = verify_log(&path).unwrap();
        assert_eq!(report.entries, 0);
    }

    #[test]
    fn test_pending_queue_drops_oldest_at_capacity() {
        let dir = TempDir::new().unwrap();
        let config = ChronosConfig {
            write_timeout_ms: 0,
            max_pending_records: 2,
            ..test_config(&dir)
        };

        // Each dip-and-recover pair emits one attack record; with storage
        // down they accumulate behind the startup heartbeat.
        let mut deltas = vec![0.0];
        for _ in 0..3 {
            deltas.extend([-200.0, 0.0]);
        }
        let tick_count = deltas.len();

        let mut tracker = Tracker::new(config, test_hub(deltas)).unwrap();
        for _ in 0..tick_count {
            tracker.tick();
        }

        assert_eq!(tracker.pending_appends(), 2);
        assert_eq!(tracker.next_sequence(), 0);
    }

    #[test]
    fn test_restart_extends_same_chain() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let path = config.log_path.clone();

        {
            let mut tracker = Tracker::new(config.clone(), test_hub(vec![0.0; 2])).unwrap();
            tracker.tick();
        }
        {
            let mut tracker = Tracker::new(config, test_hub(vec![0.0; 2])).unwrap();
            assert_eq!(tracker.next_sequence(), 1);
            tracker.tick();
        }

        let report = verify_log(&path).unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.heartbeats, 2);
    }
}
