//! Typed rows for the dashboard feeds.
//!
//! These mirror the backend tables the resident pages render. Rows are
//! plain data: the backend owns the schema, the agent just deserializes
//! what the query returned.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Running state of a laundry machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaundryState {
    /// Machine is free.
    Idle,
    /// A cycle is in progress.
    Running,
    /// A finished cycle is waiting to be emptied.
    Done,
}

/// One washer or dryer row from the laundry status table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaundryMachine {
    /// Row id.
    pub id: i64,
    /// Display name ("Washer", "Dryer").
    pub name: String,
    /// Current running state.
    pub state: LaundryState,
    /// Seconds left in the cycle at `updated_at`, if running.
    #[serde(default)]
    pub seconds_remaining: Option<i64>,
    /// When the backend last updated this row.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl LaundryMachine {
    /// Interpolate the countdown client-side between polls.
    ///
    /// The backend only updates `seconds_remaining` when the machine reports
    /// in; the pages tick the displayed countdown locally from the row's
    /// `updated_at`, clamped at zero.
    pub fn remaining_at(&self, now: OffsetDateTime) -> Option<Duration> {
        let seconds = self.seconds_remaining?;
        let elapsed = now - self.updated_at;
        let remaining = Duration::seconds(seconds) - elapsed;
        Some(remaining.max(Duration::ZERO))
    }
}

/// One controllable light group row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGroup {
    /// Row id; also the control key for debounced commands.
    pub id: i64,
    /// Display name ("Living Room", "Porch").
    pub name: String,
    /// Whether the group is on.
    pub power: bool,
    /// Brightness percentage, 0-100.
    pub brightness: u8,
    /// Hex color ("#rrggbb"), if the group supports color.
    #[serde(default)]
    pub color: Option<String>,
    /// When the backend last updated this row.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One environmental sensor sample row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSample {
    /// Row id.
    pub id: i64,
    /// Where the sensor lives ("kitchen", "garage").
    pub location: String,
    /// What it measures ("temperature", "humidity").
    pub kind: String,
    /// Measured value.
    pub value: f64,
    /// Unit string ("°C", "%").
    pub unit: String,
    /// When the sample was captured.
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_laundry_machine_deserialize() {
        let json = r#"{
            "id": 1,
            "name": "Washer",
            "state": "running",
            "seconds_remaining": 1200,
            "updated_at": "2026-08-01T10:00:00Z"
        }"#;
        let machine: LaundryMachine = serde_json::from_str(json).unwrap();
        assert_eq!(machine.state, LaundryState::Running);
        assert_eq!(machine.seconds_remaining, Some(1200));
    }

    #[test]
    fn test_laundry_machine_without_countdown() {
        let json = r#"{
            "id": 2,
            "name": "Dryer",
            "state": "idle",
            "updated_at": "2026-08-01T10:00:00Z"
        }"#;
        let machine: LaundryMachine = serde_json::from_str(json).unwrap();
        assert_eq!(machine.state, LaundryState::Idle);
        assert_eq!(machine.seconds_remaining, None);
        assert_eq!(machine.remaining_at(datetime!(2026-08-01 10:05:00 UTC)), None);
    }

    #[test]
    fn test_countdown_interpolation() {
        let machine = LaundryMachine {
            id: 1,
            name: "Washer".to_string(),
            state: LaundryState::Running,
            seconds_remaining: Some(600),
            updated_at: datetime!(2026-08-01 10:00:00 UTC),
        };

        // Four minutes after the backend update, six minutes shrink to two.
        let remaining = machine.remaining_at(datetime!(2026-08-01 10:04:00 UTC));
        assert_eq!(remaining, Some(Duration::seconds(120)));

        // Past the end of the cycle the countdown clamps at zero.
        let remaining = machine.remaining_at(datetime!(2026-08-01 10:30:00 UTC));
        assert_eq!(remaining, Some(Duration::ZERO));
    }

    #[test]
    fn test_light_group_roundtrip() {
        let group = LightGroup {
            id: 3,
            name: "Living Room".to_string(),
            power: true,
            brightness: 70,
            color: Some("#ffcc88".to_string()),
            updated_at: datetime!(2026-08-01 20:00:00 UTC),
        };
        let json = serde_json::to_string(&group).unwrap();
        let back: LightGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, group);
    }

    #[test]
    fn test_sensor_sample_deserialize() {
        let json = r#"{
            "id": 9,
            "location": "kitchen",
            "kind": "temperature",
            "value": 21.5,
            "unit": "°C",
            "captured_at": "2026-08-01T10:00:00Z"
        }"#;
        let sample: SensorSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.location, "kitchen");
        assert_eq!(sample.value, 21.5);
    }
}
