//! Duty status timeline types

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::services::clock::parse_clock;

/// Minutes in one log sheet; also the "24:00" end-of-day sentinel.
pub const DAY_MINUTES: f64 = 1440.0;

/// Driver activity category. Declaration order is the top-to-bottom lane
/// order of a log sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DutyStatus {
    #[serde(rename = "OFF")]
    OffDuty,
    #[serde(rename = "SB")]
    SleeperBerth,
    #[serde(rename = "D")]
    Driving,
    #[serde(rename = "ON")]
    OnDutyNotDriving,
}

impl DutyStatus {
    pub const ALL: [DutyStatus; 4] = [
        DutyStatus::OffDuty,
        DutyStatus::SleeperBerth,
        DutyStatus::Driving,
        DutyStatus::OnDutyNotDriving,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            DutyStatus::OffDuty => "OFF",
            DutyStatus::SleeperBerth => "SB",
            DutyStatus::Driving => "D",
            DutyStatus::OnDutyNotDriving => "ON",
        }
    }

    /// Lane index on the log sheet grid (0 = top).
    pub const fn lane(self) -> usize {
        match self {
            DutyStatus::OffDuty => 0,
            DutyStatus::SleeperBerth => 1,
            DutyStatus::Driving => 2,
            DutyStatus::OnDutyNotDriving => 3,
        }
    }

    /// Counts towards the duty window and the cycle.
    pub const fn is_on_duty(self) -> bool {
        matches!(self, DutyStatus::Driving | DutyStatus::OnDutyNotDriving)
    }
}

/// A run of one duty status within a single day, in minutes since midnight.
///
/// Boundaries are accepted on the wire either as numbers of minutes or as
/// "HH:MM" labels ("24:00" is the end of the day).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub status: DutyStatus,
    #[serde(deserialize_with = "deserialize_clock")]
    pub from: f64,
    #[serde(deserialize_with = "deserialize_clock")]
    pub to: f64,
}

impl Segment {
    pub fn new(status: DutyStatus, from: f64, to: f64) -> Self {
        Self { status, from, to }
    }

    pub fn duration_minutes(&self) -> f64 {
        self.to - self.from
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes() / 60.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClockValue {
    Minutes(f64),
    Label(String),
}

fn deserialize_clock<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match ClockValue::deserialize(deserializer)? {
        ClockValue::Minutes(minutes) if minutes.is_finite() => Ok(minutes.clamp(0.0, DAY_MINUTES)),
        ClockValue::Minutes(minutes) => Err(serde::de::Error::custom(format!(
            "segment boundary must be finite, got {}",
            minutes
        ))),
        ClockValue::Label(label) => parse_clock(&label).map_err(serde::de::Error::custom),
    }
}

/// Hours per duty status for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusTotals {
    #[serde(rename = "OFF")]
    pub off_duty: f64,
    #[serde(rename = "SB")]
    pub sleeper_berth: f64,
    #[serde(rename = "D")]
    pub driving: f64,
    #[serde(rename = "ON")]
    pub on_duty: f64,
}

impl StatusTotals {
    pub fn from_segments(segments: &[Segment]) -> Self {
        let mut totals = Self::default();
        for segment in segments {
            *totals.slot_mut(segment.status) += segment.duration_hours();
        }
        totals
    }

    pub fn get(&self, status: DutyStatus) -> f64 {
        match status {
            DutyStatus::OffDuty => self.off_duty,
            DutyStatus::SleeperBerth => self.sleeper_berth,
            DutyStatus::Driving => self.driving,
            DutyStatus::OnDutyNotDriving => self.on_duty,
        }
    }

    pub fn sum(&self) -> f64 {
        self.off_duty + self.sleeper_berth + self.driving + self.on_duty
    }

    fn slot_mut(&mut self, status: DutyStatus) -> &mut f64 {
        match status {
            DutyStatus::OffDuty => &mut self.off_duty,
            DutyStatus::SleeperBerth => &mut self.sleeper_berth,
            DutyStatus::Driving => &mut self.driving,
            DutyStatus::OnDutyNotDriving => &mut self.on_duty,
        }
    }
}

/// One duty day: normalized segments covering 00:00..24:00 of `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyDay {
    pub date: NaiveDate,
    pub segments: Vec<Segment>,
    pub totals: StatusTotals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopKind {
    #[serde(rename = "pickup_on_duty")]
    PickupOnDuty,
    #[serde(rename = "break_30min")]
    Break30Min,
    #[serde(rename = "overnight_off")]
    OvernightOff,
    #[serde(rename = "dropoff_on_duty")]
    DropoffOnDuty,
    #[serde(rename = "fuel_stop")]
    FuelStop,
}

/// A timestamped occurrence on the trip, distinct from the segment timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEvent {
    pub kind: StopKind,
    pub at: DateTime<FixedOffset>,
    pub duration_minutes: u32,
}

/// An uninterrupted stretch of driving on the absolute timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveLeg {
    pub start: DateTime<FixedOffset>,
    pub hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub cycle_used_hours: f64,
    pub cycle_max_hours: f64,
    pub cycle_exceeded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    pub days: Vec<DutyDay>,
    pub stops: Vec<StopEvent>,
    pub drive_legs: Vec<DriveLeg>,
    pub summary: CycleSummary,
}
