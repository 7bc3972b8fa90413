/*!
 * Sensor capability interface
 *
 * The core never touches concrete driver types: each sensor kind sits behind
 * a small trait with a single synchronous `read()`, called once per sampling
 * tick with no timing guarantee beyond that. A failed channel degrades to a
 * missing value in the snapshot; it never aborts the tick.
 *
 * The synthetic drivers at the bottom back the `run --simulate` mode and the
 * test suite. Real hardware drivers (I2C barometers, the IMU, the particulate
 * counter, the GPS) live outside this crate and plug into the same traits.
 */

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::warn;

use chronos_core_chain::Location;

/// A channel returned no value or an out-of-range value
#[derive(Debug, Clone)]
pub struct SensorError {
    pub detail: String,
}

impl SensorError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}

impl std::error::Error for SensorError {}

/// Paired differential-pressure channel (target and ambient barometers)
pub trait PressurePair {
    /// Read `(pressure_a, pressure_b)` in Pascals
    fn read(&mut self) -> Result<(f64, f64), SensorError>;
}

/// Single scalar channel (vibration magnitude, audio level, dust density)
pub trait ScalarChannel {
    fn read(&mut self) -> Result<f64, SensorError>;
}

/// Optional GPS fix channel
pub trait LocationChannel {
    /// `Ok(None)` is a healthy read with no fix
    fn read(&mut self) -> Result<Option<Location>, SensorError>;
}

/// One synchronized cross-channel reading
///
/// Ephemeral: produced and consumed within one sampling tick, never
/// persisted directly. `None` marks a channel that failed this tick.
#[derive(Debug, Clone)]
pub struct SensorSnapshot {
    pub pressure_a: Option<f64>,
    pub pressure_b: Option<f64>,
    /// Unitless magnitude, >= 0
    pub vibration_magnitude: Option<f64>,
    pub audio_level: Option<f64>,
    pub dust_density: Option<f64>,
    pub location: Option<Location>,
    /// Monotonic device time for durations
    pub monotonic: Instant,
    /// Wall-clock estimate for log timestamps
    pub wall_clock: DateTime<Utc>,
}

impl SensorSnapshot {
    /// `pressure_a - pressure_b`, or `None` when either channel is missing
    pub fn delta_pa(&self) -> Option<f64> {
        Some(self.pressure_a? - self.pressure_b?)
    }
}

/// Owns the boxed channels and assembles one snapshot per tick
pub struct SensorHub {
    pressure: Box<dyn PressurePair>,
    vibration: Box<dyn ScalarChannel>,
    audio: Box<dyn ScalarChannel>,
    dust: Box<dyn ScalarChannel>,
    location: Box<dyn LocationChannel>,
}

impl SensorHub {
    pub fn new(
        pressure: Box<dyn PressurePair>,
        vibration: Box<dyn ScalarChannel>,
        audio: Box<dyn ScalarChannel>,
        dust: Box<dyn ScalarChannel>,
        location: Box<dyn LocationChannel>,
    ) -> Self {
        Self {
            pressure,
            vibration,
            audio,
            dust,
            location,
        }
    }

    /// A hub of synthetic drivers for demo and simulation runs
    pub fn synthetic() -> Self {
        Self::new(
            Box::new(SyntheticPressurePair::quiet()),
            Box::new(SyntheticScalar::new(0.8, 0.4)),
            Box::new(SyntheticScalar::new(0.3, 0.1)),
            Box::new(SyntheticScalar::new(0.05, 0.03)),
            Box::new(FixedLocation::none()),
        )
    }

    /// Read every channel once and assemble a snapshot
    ///
    /// Failed channels are logged at warn level and left as `None`; an
    /// out-of-range vibration reading counts as a failure.
    pub fn sample(&mut self) -> SensorSnapshot {
        let (pressure_a, pressure_b) = match self.pressure.read() {
            Ok((a, b)) => (Some(a), Some(b)),
            Err(e) => {
                warn!(channel = "pressure", error = %e, "sensor read failure");
                (None, None)
            }
        };

        let vibration_magnitude = match self.vibration.read() {
            Ok(v) if v >= 0.0 => Some(v),
            Ok(v) => {
                warn!(channel = "vibration", value = v, "out-of-range reading");
                None
            }
            Err(e) => {
                warn!(channel = "vibration", error = %e, "sensor read failure");
                None
            }
        };

        let audio_level = read_scalar(&mut *self.audio, "audio");
        let dust_density = read_scalar(&mut *self.dust, "dust");

        let location = match self.location.read() {
            Ok(fix) => fix,
            Err(e) => {
                warn!(channel = "location", error = %e, "sensor read failure");
                None
            }
        };

        SensorSnapshot {
            pressure_a,
            pressure_b,
            vibration_magnitude,
            audio_level,
            dust_density,
            location,
            monotonic: Instant::now(),
            wall_clock: Utc::now(),
        }
    }
}

fn read_scalar(channel: &mut dyn ScalarChannel, name: &'static str) -> Option<f64> {
    match channel.read() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(channel = name, error = %e, "sensor read failure");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Synthetic and scripted drivers
// ---------------------------------------------------------------------------

/// Standard sea-level pressure used as the synthetic baseline (Pa)
const AMBIENT_PA: f64 = 101_325.0;

/// Noisy differential-pressure pair with an optional repeating attack pulse
pub struct SyntheticPressurePair {
    noise_pa: f64,
    /// `(period_ticks, pulse_ticks, delta_pa)`: every `period_ticks` the pair
    /// reports `delta_pa` for `pulse_ticks` consecutive reads
    pulse: Option<(u64, u64, f64)>,
    tick: u64,
}

impl SyntheticPressurePair {
    /// Near-zero differential with a little noise
    pub fn quiet() -> Self {
        Self {
            noise_pa: 5.0,
            pulse: None,
            tick: 0,
        }
    }

    /// Quiet baseline plus a repeating attack pulse
    pub fn with_pulse(period_ticks: u64, pulse_ticks: u64, delta_pa: f64) -> Self {
        Self {
            noise_pa: 5.0,
            pulse: Some((period_ticks, pulse_ticks, delta_pa)),
            tick: 0,
        }
    }
}

impl PressurePair for SyntheticPressurePair {
    fn read(&mut self) -> Result<(f64, f64), SensorError> {
        let mut rng = rand::rng();
        let noise = rng.random_range(-self.noise_pa..self.noise_pa);
        let delta = match self.pulse {
            Some((period, len, delta_pa)) if self.tick % period < len => delta_pa,
            _ => 0.0,
        };
        self.tick += 1;
        Ok((AMBIENT_PA + delta + noise, AMBIENT_PA))
    }
}

/// Scalar channel with a fixed base and uniform jitter
pub struct SyntheticScalar {
    base: f64,
    jitter: f64,
}

impl SyntheticScalar {
    pub fn new(base: f64, jitter: f64) -> Self {
        Self { base, jitter }
    }
}

impl ScalarChannel for SyntheticScalar {
    fn read(&mut self) -> Result<f64, SensorError> {
        let mut rng = rand::rng();
        Ok((self.base + rng.random_range(-self.jitter..self.jitter)).max(0.0))
    }
}

/// Location channel that always reports the same fix (or none)
pub struct FixedLocation {
    fix: Option<Location>,
}

impl FixedLocation {
    pub fn new(fix: Location) -> Self {
        Self { fix: Some(fix) }
    }

    pub fn none() -> Self {
        Self { fix: None }
    }
}

impl LocationChannel for FixedLocation {
    fn read(&mut self) -> Result<Option<Location>, SensorError> {
        Ok(self.fix)
    }
}

/// Pressure pair driven by a fixed script of deltas; holds the last value
/// once exhausted. Used by the detector and tracker tests.
pub struct ScriptedPressurePair {
    deltas: VecDeque<f64>,
    last: f64,
}

impl ScriptedPressurePair {
    pub fn from_deltas(deltas: impl IntoIterator<Item = f64>) -> Self {
        Self {
            deltas: deltas.into_iter().collect(),
            last: 0.0,
        }
    }
}

impl PressurePair for ScriptedPressurePair {
    fn read(&mut self) -> Result<(f64, f64), SensorError> {
        if let Some(next) = self.deltas.pop_front() {
            self.last = next;
        }
        Ok((AMBIENT_PA + self.last, AMBIENT_PA))
    }
}

/// Scalar channel with a constant reading
pub struct FixedScalar(pub f64);

impl ScalarChannel for FixedScalar {
    fn read(&mut self) -> Result<f64, SensorError> {
        Ok(self.0)
    }
}

/// Channel that fails every read; exercises the degraded-snapshot path
pub struct FailingScalar;

impl ScalarChannel for FailingScalar {
    fn read(&mut self) -> Result<f64, SensorError> {
        Err(SensorError::new("no reading"))
    }
}
