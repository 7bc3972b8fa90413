/*!
 * Multi-sensor fusion snapshot
 *
 * Collapses one `SensorSnapshot` into the cross-channel reading attached to
 * an event record. Pure and deterministic: same snapshot and thresholds in,
 * same `FusionData` out. The fusion capture happens at event ONSET, so the
 * record reflects conditions when the event began (matching the firmware
 * this replaces, which latched activity at attack start).
 */

use serde::{Deserialize, Serialize};

use chronos_core_chain::{ActivityLabel, FusionData};

use crate::config::ChronosConfig;
use crate::sensors::SensorSnapshot;

/// Activity classification thresholds over vibration magnitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// At or below: `Still`
    pub still_max: f64,
    /// At or above: `Moving`; between the two: `LowActivity`
    pub moving_min: f64,
}

impl From<&ChronosConfig> for FusionConfig {
    fn from(config: &ChronosConfig) -> Self {
        Self {
            still_max: config.activity_still_max,
            moving_min: config.activity_moving_min,
        }
    }
}

/// Capture the non-pressure channels of one snapshot
pub fn fuse(snapshot: &SensorSnapshot, config: &FusionConfig) -> FusionData {
    FusionData {
        vibration_magnitude: snapshot.vibration_magnitude,
        audio_level: snapshot.audio_level,
        dust_density: snapshot.dust_density,
        activity: snapshot
            .vibration_magnitude
            .map(|v| classify_activity(v, config)),
        location: snapshot.location,
    }
}

/// Coarse three-way classifier over vibration magnitude
pub fn classify_activity(vibration_magnitude: f64, config: &FusionConfig) -> ActivityLabel {
    if vibration_magnitude <= config.still_max {
        ActivityLabel::Still
    } else if vibration_magnitude >= config.moving_min {
        ActivityLabel::Moving
    } else {
        ActivityLabel::LowActivity
    }
}
