/*!
 * Error types for Chronos
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

use chronos_core_chain::ChainError;

pub type Result<T> = std::result::Result<T, ChronosError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INTEGRITY: i32 = 3;

/// Which sensor channel failed a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Pressure,
    Vibration,
    Audio,
    Dust,
    Location,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Pressure => "pressure",
            Channel::Vibration => "vibration",
            Channel::Audio => "audio",
            Channel::Dust => "dust",
            Channel::Location => "location",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub enum ChronosError {
    /// Configuration is missing, unreadable, or internally inconsistent
    Config(String),

    /// Configuration file not found
    ConfigNotFound(PathBuf),

    /// A sensor channel returned no value or an out-of-range value
    SensorRead { channel: Channel, detail: String },

    /// Chain log writer or verifier failure
    Chain(ChainError),

    /// I/O error outside the chain log
    Io(io::Error),

    /// Generic error with message
    Other(String),
}

impl ChronosError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ChronosError::Config(_) | ChronosError::ConfigNotFound(_) => EXIT_FATAL,
            ChronosError::Chain(ChainError::ChainBroken { .. })
            | ChronosError::Chain(ChainError::ChainAbsent(_)) => EXIT_INTEGRITY,
            ChronosError::SensorRead { .. } => EXIT_PARTIAL,
            _ => EXIT_PARTIAL,
        }
    }

    /// Check if this error is fatal (the device must not start or continue)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChronosError::Config(_) | ChronosError::ConfigNotFound(_)
        )
    }
}

impl fmt::Display for ChronosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChronosError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChronosError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ChronosError::SensorRead { channel, detail } => {
                write!(f, "Sensor read failure on {} channel: {}", channel, detail)
            }
            ChronosError::Chain(e) => write!(f, "Chain log error: {}", e),
            ChronosError::Io(e) => write!(f, "I/O error: {}", e),
            ChronosError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ChronosError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChronosError::Chain(e) => Some(e),
            ChronosError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ChronosError {
    fn from(e: io::Error) -> Self {
        ChronosError::Io(e)
    }
}

impl From<ChainError> for ChronosError {
    fn from(e: ChainError) -> Self {
        ChronosError::Chain(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal() {
        let err = ChronosError::Config("end threshold above onset threshold".to_string());
        assert!(err.is_fatal());
        assert_eq!(err.exit_code(), EXIT_FATAL);
    }

    #[test]
    fn test_chain_broken_maps_to_integrity_exit() {
        let err = ChronosError::Chain(ChainError::ChainBroken {
            sequence: 3,
            reason: "entry_hash does not match its record".to_string(),
        });
        assert!(!err.is_fatal());
        assert_eq!(err.exit_code(), EXIT_INTEGRITY);
    }

    #[test]
    fn test_sensor_read_is_partial() {
        let err = ChronosError::SensorRead {
            channel: Channel::Dust,
            detail: "no reading".to_string(),
        };
        assert_eq!(err.exit_code(), EXIT_PARTIAL);
        assert!(err.to_string().contains("dust"));
    }
}
