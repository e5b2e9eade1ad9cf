use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServoId(pub u8);

impl fmt::Display for ServoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ServoId {
    /// Parses operator input: decimal digits only, value in `0..=255`.
    pub fn parse_field(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::MissingId);
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidId);
        }
        // Digits-only strings that overflow u8 are out of range, not malformed.
        raw.parse::<u8>().map(ServoId).map_err(|_| ValidationError::InvalidId)
    }
}

/// Allowed angle window in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRange {
    pub min: f64,
    pub max: f64,
}

impl Default for PositionRange {
    fn default() -> Self {
        Self { min: 0.0, max: 180.0 }
    }
}

impl PositionRange {
    pub fn check(&self, value: f64) -> Result<(), ValidationError> {
        if value < self.min {
            Err(ValidationError::BelowMinimum { value, min: self.min })
        } else if value > self.max {
            Err(ValidationError::AboveMaximum { value, max: self.max })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub temperature: Option<f64>,
    pub current: Option<f64>,
    pub voltage: Option<f64>,
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServoState {
    pub id: ServoId,
    pub position: f64,
    pub pending_position: f64,
    pub range: PositionRange,
    pub calibrating: bool,
    pub telemetry: Telemetry,
}

impl ServoState {
    pub fn new(id: ServoId, range: PositionRange) -> Self {
        Self {
            id,
            position: 0.0,
            pending_position: 0.0,
            range,
            calibrating: false,
            telemetry: Telemetry::default(),
        }
    }
}

/// Partial telemetry merged into a [`ServoState`]. `None` fields leave the
/// stored value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryUpdate {
    pub position: Option<f64>,
    pub temperature: Option<f64>,
    pub current: Option<f64>,
    pub voltage: Option<f64>,
    pub speed: Option<f64>,
}

/// `info` object of `/get_servo_info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ServoInfo {
    #[serde(default)]
    pub current_position: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
}

impl From<ServoInfo> for TelemetryUpdate {
    fn from(info: ServoInfo) -> Self {
        Self {
            position: info.current_position,
            temperature: info.temperature,
            current: info.current,
            voltage: info.voltage,
            speed: info.speed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PingReport {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ServoPosition {
    pub servo_id: ServoId,
    pub position: f64,
    pub speed: f64,
}

/// Gyro and accelerometer payloads are passed through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImuReading {
    pub gyro: serde_json::Value,
    pub accel: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParams {
    pub speed: u32,
    pub current_threshold: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self { speed: 300, current_threshold: 600.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_accepts_full_id_range() {
        assert_eq!(ServoId::parse_field("0"), Ok(ServoId(0)));
        assert_eq!(ServoId::parse_field("255"), Ok(ServoId(255)));
        assert_eq!(ServoId::parse_field("007"), Ok(ServoId(7)));
    }

    #[test]
    fn parse_field_rejects_bad_input() {
        assert_eq!(ServoId::parse_field(""), Err(ValidationError::MissingId));
        assert_eq!(ServoId::parse_field("256"), Err(ValidationError::InvalidId));
        assert_eq!(ServoId::parse_field("300"), Err(ValidationError::InvalidId));
        assert_eq!(ServoId::parse_field("-1"), Err(ValidationError::InvalidId));
        assert_eq!(ServoId::parse_field("1.5"), Err(ValidationError::InvalidId));
        assert_eq!(ServoId::parse_field("12a"), Err(ValidationError::InvalidId));
        assert_eq!(ServoId::parse_field("99999999999999999999"), Err(ValidationError::InvalidId));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let r = PositionRange::default();
        assert!(r.check(0.0).is_ok());
        assert!(r.check(180.0).is_ok());
        assert!(matches!(r.check(-0.5), Err(ValidationError::BelowMinimum { .. })));
        assert!(matches!(r.check(181.0), Err(ValidationError::AboveMaximum { .. })));
    }

    #[test]
    fn servo_info_tolerates_missing_fields() {
        let info: ServoInfo = serde_json::from_str(r#"{"current_position": 12.5, "voltage": 7.4}"#).unwrap();
        let update = TelemetryUpdate::from(info);
        assert_eq!(update.position, Some(12.5));
        assert_eq!(update.voltage, Some(7.4));
        assert_eq!(update.temperature, None);
    }
}
