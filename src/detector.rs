/*!
 * Differential pressure event detector
 *
 * Hysteresis state machine over `delta = pressure_a - pressure_b`, evaluated
 * once per sampling tick:
 *
 * - `Idle -> Onset` when delta drops to or below `-attack_threshold_pa`
 * - `Onset`/`Active` stay open while delta stays at or below
 *   `-attack_end_threshold_pa` (the weaker end threshold keeps one noisy
 *   sample near the boundary from splitting a single physical event)
 * - the first tick back above `-attack_end_threshold_pa` closes the window
 *   and emits exactly one record
 *
 * Duration and average are only finalized at close; a restart mid-window
 * loses the event rather than logging a partial one. A tick with a missing
 * pressure channel suspends detection (state held, nothing accumulated).
 */

use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, info};

use chronos_core_chain::{EventRecord, FusionData};

use crate::config::ChronosConfig;
use crate::fusion::{fuse, FusionConfig};
use crate::sensors::SensorSnapshot;

/// Detector state, exposed for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Onset,
    Active,
}

/// Accumulated state of one open event window
struct Window {
    onset_wall: DateTime<Utc>,
    onset_monotonic: Instant,
    deltas: Vec<f64>,
    /// Fusion snapshot latched at onset
    fusion: FusionData,
}

enum State {
    Idle,
    Onset(Window),
    Active(Window),
}

/// Hysteresis event detector
pub struct Detector {
    attack_threshold_pa: f64,
    end_threshold_pa: f64,
    fusion_config: FusionConfig,
    state: State,
}

impl Detector {
    pub fn new(config: &ChronosConfig) -> Self {
        Self {
            attack_threshold_pa: config.attack_threshold_pa,
            end_threshold_pa: config.attack_end_threshold_pa,
            fusion_config: FusionConfig::from(config),
            state: State::Idle,
        }
    }

    pub fn state(&self) -> DetectorState {
        match self.state {
            State::Idle => DetectorState::Idle,
            State::Onset(_) => DetectorState::Onset,
            State::Active(_) => DetectorState::Active,
        }
    }

    /// Evaluate one sampling tick; emits at most one record
    pub fn tick(&mut self, snapshot: &SensorSnapshot) -> Option<EventRecord> {
        let Some(delta) = snapshot.delta_pa() else {
            // Pressure channel missing: detection is suspended for this tick.
            debug!("pressure unavailable, detection suspended for this tick");
            return None;
        };

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {
                if delta <= -self.attack_threshold_pa {
                    info!(delta_pa = delta, "attack onset detected");
                    self.state = State::Onset(Window {
                        onset_wall: snapshot.wall_clock,
                        onset_monotonic: snapshot.monotonic,
                        deltas: vec![delta],
                        fusion: fuse(snapshot, &self.fusion_config),
                    });
                }
                None
            }
            State::Onset(window) | State::Active(window) => {
                if delta <= -self.end_threshold_pa {
                    let mut window = window;
                    window.deltas.push(delta);
                    self.state = State::Active(window);
                    None
                } else {
                    Some(self.close(window, snapshot))
                }
            }
        }
    }

    fn close(&self, window: Window, snapshot: &SensorSnapshot) -> EventRecord {
        let duration_ms = snapshot
            .monotonic
            .duration_since(window.onset_monotonic)
            .as_millis() as u64;
        let avg_delta_pa = window.deltas.iter().sum::<f64>() / window.deltas.len() as f64;
        info!(
            duration_ms,
            avg_delta_pa, "attack ended, emitting event record"
        );
        EventRecord::attack(window.onset_wall, duration_ms, avg_delta_pa, window.fusion)
    }
}
