/*!
 * Chronos - wearable forensic attack logger
 *
 * Fuses low-cost sensors to detect short pneumatic events and records them
 * in a tamper-evident log:
 * - Differential-pressure event detection with onset/end hysteresis
 * - Cross-channel fusion snapshot (vibration, audio, particulate, GPS)
 * - SHA-256 hash-chained append-only log (chronos-core-chain)
 * - Offline chain verification and summary reporting
 */

pub mod config;
pub mod detector;
pub mod error;
pub mod fusion;
pub mod logging;
pub mod report;
pub mod sensors;
pub mod tracker;

// Re-export commonly used types
pub use config::{ChronosConfig, LogLevel};
pub use detector::{Detector, DetectorState};
pub use error::{ChronosError, Result};
pub use sensors::{SensorHub, SensorSnapshot};
pub use tracker::Tracker;

pub use chronos_core_chain::{
    verify_log, ChainError, ChainReport, ChainWriter, EventKind, EventRecord, LogEntry,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
