//! Trip planning request/response types

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{DutyStatus, Place, Segment, StatusTotals, StopKind};

/// Request to plan a trip current → pickup → dropoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTripRequest {
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub current_cycle_used_hours: f64,
    /// Trip start; defaults to today 08:00 UTC
    #[serde(default)]
    pub start_time_iso: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTripResponse {
    /// Encoded route geometry (polyline, precision 6)
    pub polyline: String,
    pub summary: TripSummary,
    pub places: TripPlaces,
    pub stops: Vec<TripStop>,
    pub days: Vec<LogSheet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub distance_miles: f64,
    pub drive_hours: f64,
    pub cycle_used_hours: f64,
    pub cycle_max_hours: f64,
    pub cycle_exceeded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlaces {
    pub current: Place,
    pub pickup: Place,
    pub dropoff: Place,
}

/// A stop event placed on the map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStop {
    pub kind: StopKind,
    pub at: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub lat: f64,
    pub lng: f64,
    /// Display name of the nearby place, for pickup/dropoff only
    pub near: Option<String>,
}

/// Display-ready log sheet for one duty day
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSheet {
    pub date: NaiveDate,
    pub segments: Vec<SheetSegment>,
    pub totals: StatusTotals,
    pub labels: Vec<TimeLabel>,
}

/// Segment with "HH:MM" boundaries on the 5-minute grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSegment {
    pub status: DutyStatus,
    pub from: String,
    pub to: String,
}

/// Annotation shown under the grid at a time of day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLabel {
    /// "HH:MM"
    pub time: String,
    #[serde(default)]
    pub text: String,
}

/// Request to render a single log sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogbookRequest {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub segments: Option<Vec<Segment>>,
    #[serde(default)]
    pub labels: Option<Vec<TimeLabel>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogbookResponse {
    pub svg: String,
}
