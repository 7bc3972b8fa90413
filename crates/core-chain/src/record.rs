//! Event records and their canonical textual form
//!
//! A record is the unit of persisted forensic truth: one detected attack or
//! one heartbeat. The canonical text produced by [`EventRecord::canonical_fields`]
//! is the exact byte sequence that gets hashed into the chain, so the
//! formatting here is fixed by the log format and must never drift.
//!
//! Fixed numeric formatting: pressure and vibration carry one decimal place,
//! audio and dust two, latitude/longitude two, altitude one. Missing optional
//! channels serialize as empty fields.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LineError;

/// Timestamp format shared by writer and verifier
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Kind of persisted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A detected differential-pressure attack
    AirRapierAttack,
    /// Periodic proof-of-uptime entry, emitted independent of detection
    Heartbeat,
}

impl EventKind {
    /// Tag used in the persisted log
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AirRapierAttack => "AirRapier_Attack",
            EventKind::Heartbeat => "Heartbeat",
        }
    }

    fn parse(s: &str) -> Result<Self, LineError> {
        match s {
            "AirRapier_Attack" => Ok(EventKind::AirRapierAttack),
            "Heartbeat" => Ok(EventKind::Heartbeat),
            other => Err(LineError::BadEventType(other.to_string())),
        }
    }
}

/// Coarse activity classification from the vibration channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityLabel {
    Still,
    LowActivity,
    Moving,
}

impl ActivityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Still => "Still",
            ActivityLabel::LowActivity => "LowActivity",
            ActivityLabel::Moving => "Moving",
        }
    }

    fn parse(s: &str) -> Result<Self, LineError> {
        match s {
            "Still" => Ok(ActivityLabel::Still),
            "LowActivity" => Ok(ActivityLabel::LowActivity),
            "Moving" => Ok(ActivityLabel::Moving),
            other => Err(LineError::BadActivity(other.to_string())),
        }
    }
}

/// GPS fix attached to a record when the location channel had one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// Cross-channel reading captured at event onset
///
/// Produced by the fusion layer; every field is optional because a failed
/// channel degrades to a missing value rather than blocking the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionData {
    pub vibration_magnitude: Option<f64>,
    pub audio_level: Option<f64>,
    pub dust_density: Option<f64>,
    pub activity: Option<ActivityLabel>,
    pub location: Option<Location>,
}

/// One persisted event: an attack or a heartbeat
///
/// Immutable once written to the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub onset_timestamp: DateTime<Utc>,
    /// Milliseconds from onset to close; always 0 for heartbeats
    pub duration_ms: u64,
    /// Mean of (pressure_a - pressure_b) over the active window, in Pa
    pub avg_delta_pa: f64,
    pub activity: Option<ActivityLabel>,
    pub vibration_magnitude: Option<f64>,
    pub audio_level: Option<f64>,
    pub dust_density: Option<f64>,
    pub location: Option<Location>,
}

impl EventRecord {
    /// Create a heartbeat record for the given wall-clock instant
    pub fn heartbeat(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Heartbeat,
            onset_timestamp: timestamp,
            duration_ms: 0,
            avg_delta_pa: 0.0,
            activity: None,
            vibration_magnitude: None,
            audio_level: None,
            dust_density: None,
            location: None,
        }
    }

    /// Create an attack record from a closed detection window
    pub fn attack(
        onset_timestamp: DateTime<Utc>,
        duration_ms: u64,
        avg_delta_pa: f64,
        fusion: FusionData,
    ) -> Self {
        Self {
            kind: EventKind::AirRapierAttack,
            onset_timestamp,
            duration_ms,
            avg_delta_pa,
            activity: fusion.activity,
            vibration_magnitude: fusion.vibration_magnitude,
            audio_level: fusion.audio_level,
            dust_density: fusion.dust_density,
            location: fusion.location,
        }
    }

    /// Render the 11 record fields in canonical order
    ///
    /// This text participates in the entry hash byte-for-byte; the verifier
    /// hashes the stored text directly and never re-derives it from a parse.
    pub fn canonical_fields(&self) -> String {
        let (lat, lon, alt) = match self.location {
            Some(loc) => (
                format!("{:.2}", loc.lat),
                format!("{:.2}", loc.lon),
                format!("{:.1}", loc.alt),
            ),
            None => (String::new(), String::new(), String::new()),
        };

        format!(
            "{},{},{},{:.1},{},{},{},{},{},{},{}",
            self.onset_timestamp.format(TIMESTAMP_FORMAT),
            self.kind.as_str(),
            self.duration_ms,
            self.avg_delta_pa,
            self.activity.map(|a| a.as_str()).unwrap_or(""),
            fmt_opt(self.vibration_magnitude, 1),
            fmt_opt(self.audio_level, 2),
            fmt_opt(self.dust_density, 2),
            lat,
            lon,
            alt,
        )
    }

    /// Decode the 11 record fields of a stored line
    pub fn from_canonical_fields(fields: &[&str]) -> Result<Self, LineError> {
        debug_assert_eq!(fields.len(), 11);

        let onset_timestamp = NaiveDateTime::parse_from_str(fields[0], TIMESTAMP_FORMAT)
            .map_err(|_| LineError::BadTimestamp(fields[0].to_string()))?
            .and_utc();
        let kind = EventKind::parse(fields[1])?;
        let duration_ms = fields[2]
            .parse::<u64>()
            .map_err(|_| LineError::BadNumber {
                field: "duration_ms",
                value: fields[2].to_string(),
            })?;
        let avg_delta_pa = parse_f64("avg_delta_pa", fields[3])?;
        let activity = if fields[4].is_empty() {
            None
        } else {
            Some(ActivityLabel::parse(fields[4])?)
        };

        let location = match (fields[8], fields[9], fields[10]) {
            ("", "", "") => None,
            (lat, lon, alt) if !lat.is_empty() && !lon.is_empty() && !alt.is_empty() => {
                Some(Location {
                    lat: parse_f64("lat", lat)?,
                    lon: parse_f64("lon", lon)?,
                    alt: parse_f64("alt", alt)?,
                })
            }
            _ => return Err(LineError::PartialLocation),
        };

        Ok(Self {
            kind,
            onset_timestamp,
            duration_ms,
            avg_delta_pa,
            activity,
            vibration_magnitude: parse_opt_f64("vibration_magnitude", fields[5])?,
            audio_level: parse_opt_f64("audio_level", fields[6])?,
            dust_density: parse_opt_f64("dust_density", fields[7])?,
            location,
        })
    }
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => String::new(),
    }
}

fn parse_f64(field: &'static str, value: &str) -> Result<f64, LineError> {
    value.parse::<f64>().map_err(|_| LineError::BadNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_opt_f64(field: &'static str, value: &str) -> Result<Option<f64>, LineError> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_f64(field, value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 11, 1, 14, 6).unwrap()
    }

    #[test]
    fn test_heartbeat_canonical_form() {
        let record = EventRecord::heartbeat(ts());
        assert_eq!(
            record.canonical_fields(),
            "2025-11-11T01:14:06Z,Heartbeat,0,0.0,,,,,,,"
        );
    }

    #[test]
    fn test_attack_canonical_form() {
        let fusion = FusionData {
            vibration_magnitude: Some(3.24),
            audio_level: Some(0.411),
            dust_density: Some(0.08),
            activity: Some(ActivityLabel::Moving),
            location: Some(Location {
                lat: 37.774,
                lon: -122.414,
                alt: 15.04,
            }),
        };
        let record = EventRecord::attack(ts(), 120, -180.52, fusion);
        assert_eq!(
            record.canonical_fields(),
            "2025-11-11T01:14:06Z,AirRapier_Attack,120,-180.5,Moving,3.2,0.41,0.08,37.77,-122.41,15.0"
        );
    }

    #[test]
    fn test_canonical_round_trip() {
        let fusion = FusionData {
            vibration_magnitude: Some(1.5),
            audio_level: None,
            dust_density: Some(0.12),
            activity: Some(ActivityLabel::Still),
            location: None,
        };
        let record = EventRecord::attack(ts(), 450, -96.3, fusion);
        let text = record.canonical_fields();
        let fields: Vec<&str> = text.split(',').collect();
        let parsed = EventRecord::from_canonical_fields(&fields).unwrap();
        assert_eq!(parsed, record);
        // Round-tripped record must re-render to identical bytes.
        assert_eq!(parsed.canonical_fields(), text);
    }

    #[test]
    fn test_partial_location_rejected() {
        let fields = vec![
            "2025-11-11T01:14:06Z",
            "Heartbeat",
            "0",
            "0.0",
            "",
            "",
            "",
            "",
            "37.77",
            "",
            "",
        ];
        assert!(matches!(
            EventRecord::from_canonical_fields(&fields),
            Err(LineError::PartialLocation)
        ));
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let fields = vec![
            "2025-11-11T01:14:06Z",
            "Sneeze",
            "0",
            "0.0",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ];
        assert!(matches!(
            EventRecord::from_canonical_fields(&fields),
            Err(LineError::BadEventType(_))
        ));
    }
}
