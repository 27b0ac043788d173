//! Trip planning: geocode, route, schedule, then place every stop on the map
//! and build the daily log sheets.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{PlanError, PlanResult};
use crate::services::clock::{format_time_of_day, resolve_start_time};
use crate::services::duty_schedule::{compute_schedule, drive_hours_before, instant_at_drive_fraction};
use crate::services::geo::point_on_polyline;
use crate::services::geocoding::Geocoder;
use crate::services::logbook::log_sheet;
use crate::services::routing::{Route, RoutingService};
use crate::types::{
    Coordinates, Place, PlanTripRequest, PlanTripResponse, ScheduleResult, StopEvent, StopKind,
    TimeLabel, TripPlaces, TripStop, TripSummary,
};

/// A fuel stop is suggested every this many miles of route.
pub const FUEL_INTERVAL_MILES: f64 = 1000.0;

/// One request field that could not be geocoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceLookupFailure {
    /// Request field name, as sent on the wire
    pub field: &'static str,
    /// User-facing hint
    pub message: &'static str,
}

#[derive(Debug, Error)]
pub enum TripPlanError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("places not found: {}", failed_fields(.0))]
    PlacesNotFound(Vec<PlaceLookupFailure>),

    #[error("route unavailable: {0}")]
    RouteUnavailable(String),
}

fn failed_fields(failures: &[PlaceLookupFailure]) -> String {
    failures.iter().map(|f| f.field).collect::<Vec<_>>().join(", ")
}

impl TripPlanError {
    /// Per-field messages for `PlacesNotFound`, shaped `{ field: [message] }`
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            TripPlanError::PlacesNotFound(failures) => {
                let map: serde_json::Map<String, serde_json::Value> = failures
                    .iter()
                    .map(|f| (f.field.to_string(), serde_json::json!([f.message])))
                    .collect();
                Some(serde_json::Value::Object(map))
            }
            _ => None,
        }
    }
}

struct PlaceQuery<'a> {
    field: &'static str,
    query: &'a str,
    not_found: &'static str,
}

/// Plans trips against a geocoder and a routing service
pub struct TripPlanner {
    geocoder: Arc<dyn Geocoder>,
    routing: Arc<dyn RoutingService>,
}

impl TripPlanner {
    pub fn new(geocoder: Arc<dyn Geocoder>, routing: Arc<dyn RoutingService>) -> Self {
        Self { geocoder, routing }
    }

    pub async fn plan(&self, request: &PlanTripRequest) -> Result<PlanTripResponse, TripPlanError> {
        self.plan_at(request, Utc::now()).await
    }

    /// Plan with an explicit "now" for resolving a missing start time
    pub async fn plan_at(
        &self,
        request: &PlanTripRequest,
        now: DateTime<Utc>,
    ) -> Result<PlanTripResponse, TripPlanError> {
        let cycle_used = validate_cycle_hours(request.current_cycle_used_hours)?;
        let start = resolve_start_time(request.start_time_iso.as_deref(), now)?;

        info!(
            "Planning trip '{}' -> '{}' -> '{}' starting {}",
            request.current_location,
            request.pickup_location,
            request.dropoff_location,
            start.to_rfc3339()
        );

        let places = self.geocode_places(request).await?;

        let waypoints = [
            places.current.coordinates(),
            places.pickup.coordinates(),
            places.dropoff.coordinates(),
        ];
        let route = self.routing.route(&waypoints).await.map_err(|e| {
            warn!("Routing via {} failed: {:#}", self.routing.name(), e);
            TripPlanError::RouteUnavailable(e.to_string())
        })?;

        let drive_hours = route.duration_hours();
        let schedule = compute_schedule(drive_hours, start, cycle_used)?;

        let mut stops = place_stops(&schedule, &route, &places);
        stops.extend(fuel_stops(&schedule, &route, start));
        // Stable: stops at the same instant keep schedule order.
        stops.sort_by_key(|stop| stop.at);

        let days = schedule
            .days
            .iter()
            .zip(sheet_labels(&schedule, &stops))
            .map(|(day, labels)| log_sheet(day, labels))
            .collect::<Vec<_>>();

        info!(
            "Planned trip: {:.1} mi, {:.2} h driving, {} day(s), {} stop(s), cycle {:.2}/{:.0} h{}",
            route.distance_miles(),
            drive_hours,
            days.len(),
            stops.len(),
            schedule.summary.cycle_used_hours,
            schedule.summary.cycle_max_hours,
            if schedule.summary.cycle_exceeded { " (exceeded)" } else { "" }
        );

        Ok(PlanTripResponse {
            summary: TripSummary {
                distance_miles: round_to(route.distance_miles(), 1),
                drive_hours: round_to(drive_hours, 2),
                cycle_used_hours: round_to(schedule.summary.cycle_used_hours, 2),
                cycle_max_hours: schedule.summary.cycle_max_hours,
                cycle_exceeded: schedule.summary.cycle_exceeded,
            },
            polyline: route.polyline,
            places,
            stops,
            days,
        })
    }

    /// Geocode all three places, reporting every miss at once
    async fn geocode_places(&self, request: &PlanTripRequest) -> Result<TripPlaces, TripPlanError> {
        let (current, pickup, dropoff) = tokio::join!(
            self.lookup(PlaceQuery {
                field: "currentLocation",
                query: &request.current_location,
                not_found: "We couldn't find that place. Try 'City, ST' (e.g., 'Dallas, TX').",
            }),
            self.lookup(PlaceQuery {
                field: "pickupLocation",
                query: &request.pickup_location,
                not_found: "We couldn't find the pickup location. Try 'City, ST' or a full address.",
            }),
            self.lookup(PlaceQuery {
                field: "dropoffLocation",
                query: &request.dropoff_location,
                not_found: "We couldn't find the dropoff location. Try 'City, ST' or a full address.",
            }),
        );

        match (current, pickup, dropoff) {
            (Ok(current), Ok(pickup), Ok(dropoff)) => Ok(TripPlaces { current, pickup, dropoff }),
            (current, pickup, dropoff) => {
                let failures = [current.err(), pickup.err(), dropoff.err()]
                    .into_iter()
                    .flatten()
                    .collect();
                Err(TripPlanError::PlacesNotFound(failures))
            }
        }
    }

    async fn lookup(&self, place: PlaceQuery<'_>) -> Result<Place, PlaceLookupFailure> {
        let failure = PlaceLookupFailure {
            field: place.field,
            message: place.not_found,
        };

        match self.geocoder.geocode(place.query).await {
            Ok(Some(result)) => {
                debug!("Geocoded {} '{}' -> {}", place.field, place.query, result.display_name);
                Ok(result.into_place())
            }
            Ok(None) => {
                debug!("No geocoding match for {} '{}'", place.field, place.query);
                Err(failure)
            }
            Err(e) => {
                warn!("Geocoding {} '{}' via {} failed: {}", place.field, place.query, self.geocoder.name(), e);
                Err(failure)
            }
        }
    }
}

fn validate_cycle_hours(hours: f64) -> PlanResult<f64> {
    if hours.is_finite() && hours >= 0.0 {
        Ok(hours)
    } else {
        Err(PlanError::invalid(format!(
            "current cycle used hours must be a non-negative number, got {}",
            hours
        )))
    }
}

/// Attach map positions to the scheduled stops.
///
/// Pickup and dropoff sit at their geocoded places. Rests sit on the route at
/// the share of driving completed before them.
fn place_stops(schedule: &ScheduleResult, route: &Route, places: &TripPlaces) -> Vec<TripStop> {
    let total_drive: f64 = schedule.drive_legs.iter().map(|leg| leg.hours).sum();

    schedule
        .stops
        .iter()
        .map(|stop| match stop.kind {
            StopKind::PickupOnDuty => at_place(stop, &places.pickup),
            StopKind::DropoffOnDuty => at_place(stop, &places.dropoff),
            _ => {
                let fraction = if total_drive > 0.0 {
                    (drive_hours_before(&schedule.drive_legs, &stop.at) / total_drive).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let point = point_on_polyline(&route.polyline, fraction)
                    .unwrap_or_else(|| places.pickup.coordinates());
                on_route(stop, point)
            }
        })
        .collect()
}

fn at_place(stop: &StopEvent, place: &Place) -> TripStop {
    TripStop {
        kind: stop.kind,
        at: stop.at,
        duration_minutes: stop.duration_minutes,
        lat: place.lat,
        lng: place.lng,
        near: Some(place.display_name.clone()),
    }
}

fn on_route(stop: &StopEvent, point: Coordinates) -> TripStop {
    TripStop {
        kind: stop.kind,
        at: stop.at,
        duration_minutes: stop.duration_minutes,
        lat: point.lat,
        lng: point.lng,
        near: None,
    }
}

/// Fuel markers every `FUEL_INTERVAL_MILES` along the route
fn fuel_stops(schedule: &ScheduleResult, route: &Route, start: DateTime<FixedOffset>) -> Vec<TripStop> {
    let miles = route.distance_miles();
    if miles < FUEL_INTERVAL_MILES {
        return Vec::new();
    }

    let count = (miles / FUEL_INTERVAL_MILES).floor() as u32;
    (1..=count)
        .filter_map(|i| {
            let fraction = f64::from(i) * FUEL_INTERVAL_MILES / miles;
            let at = instant_at_drive_fraction(&schedule.drive_legs, fraction).unwrap_or(start);
            let point = point_on_polyline(&route.polyline, fraction)?;
            let stop = StopEvent {
                kind: StopKind::FuelStop,
                at,
                duration_minutes: 0,
            };
            Some(on_route(&stop, point))
        })
        .collect()
}

/// Labels for each duty day's sheet, in time-of-day order.
///
/// A sheet owns the stops from the end of the previous overnight rest up to
/// the end of its own, so two sheets sharing a date never share a label.
pub fn sheet_labels(schedule: &ScheduleResult, stops: &[TripStop]) -> Vec<Vec<TimeLabel>> {
    let sheet_starts: Vec<DateTime<FixedOffset>> = schedule
        .stops
        .iter()
        .filter(|stop| stop.kind == StopKind::OvernightOff)
        .map(|rest| rest.at + Duration::minutes(i64::from(rest.duration_minutes)))
        .collect();

    let mut labels = vec![Vec::new(); schedule.days.len()];
    for stop in stops {
        let sheet = sheet_starts.iter().filter(|start| **start <= stop.at).count();
        if let Some(sheet) = labels.get_mut(sheet) {
            sheet.push(TimeLabel {
                time: format_time_of_day(&stop.at),
                text: stop_label(stop),
            });
        }
    }
    for sheet in &mut labels {
        sheet.sort_by(|a: &TimeLabel, b: &TimeLabel| a.time.cmp(&b.time));
    }
    labels
}

fn stop_label(stop: &TripStop) -> String {
    let near = stop.near.as_deref().map(compact_place).unwrap_or_default();
    match stop.kind {
        StopKind::PickupOnDuty => {
            format!("Pre-trip/TIV — {}", if near.is_empty() { "Pickup" } else { near.as_str() })
        }
        StopKind::DropoffOnDuty => {
            format!("Post-trip/TIV — {}", if near.is_empty() { "Dropoff" } else { near.as_str() })
        }
        StopKind::Break30Min => "30-min break".to_string(),
        StopKind::OvernightOff => "10-hr break".to_string(),
        StopKind::FuelStop => "Fuel stop".to_string(),
    }
}

const STATE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Alabama", "AL"), ("Alaska", "AK"), ("Arizona", "AZ"), ("Arkansas", "AR"),
    ("California", "CA"), ("Colorado", "CO"), ("Connecticut", "CT"), ("Delaware", "DE"),
    ("District of Columbia", "DC"), ("Florida", "FL"), ("Georgia", "GA"), ("Hawaii", "HI"),
    ("Idaho", "ID"), ("Illinois", "IL"), ("Indiana", "IN"), ("Iowa", "IA"),
    ("Kansas", "KS"), ("Kentucky", "KY"), ("Louisiana", "LA"), ("Maine", "ME"),
    ("Maryland", "MD"), ("Massachusetts", "MA"), ("Michigan", "MI"), ("Minnesota", "MN"),
    ("Mississippi", "MS"), ("Missouri", "MO"), ("Montana", "MT"), ("Nebraska", "NE"),
    ("Nevada", "NV"), ("New Hampshire", "NH"), ("New Jersey", "NJ"), ("New Mexico", "NM"),
    ("New York", "NY"), ("North Carolina", "NC"), ("North Dakota", "ND"), ("Ohio", "OH"),
    ("Oklahoma", "OK"), ("Oregon", "OR"), ("Pennsylvania", "PA"), ("Rhode Island", "RI"),
    ("South Carolina", "SC"), ("South Dakota", "SD"), ("Tennessee", "TN"), ("Texas", "TX"),
    ("Utah", "UT"), ("Vermont", "VT"), ("Virginia", "VA"), ("Washington", "WA"),
    ("West Virginia", "WV"), ("Wisconsin", "WI"), ("Wyoming", "WY"),
];

fn state_abbreviation(name: &str) -> Option<&'static str> {
    STATE_ABBREVIATIONS
        .iter()
        .find(|(state, _)| state.eq_ignore_ascii_case(name))
        .map(|(_, abbr)| *abbr)
}

/// Shorten a geocoder display name to "City, ST".
///
/// "Dallas, Dallas County, Texas, 75201, United States" becomes "Dallas, TX".
/// Without a recognizable US state the last component is kept (a long
/// alphabetic one is cut to two capitals).
pub fn compact_place(display_name: &str) -> String {
    let parts: Vec<&str> = display_name
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "United States" && *p != "United States of America")
        .collect();

    let (city, rest) = match parts.split_first() {
        Some((city, rest)) if !rest.is_empty() => (*city, rest),
        Some((city, _)) => return city.to_string(),
        None => return display_name.trim().to_string(),
    };

    if let Some(abbr) = rest.iter().rev().find_map(|p| state_abbreviation(p)) {
        return format!("{}, {}", city, abbr);
    }

    let last = rest[rest.len() - 1];
    let region = if last.chars().count() > 2 && last.chars().all(char::is_alphabetic) {
        last.chars().take(2).collect::<String>().to_uppercase()
    } else {
        last.to_string()
    };
    format!("{}, {}", city, region)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::services::geocoding::GeocodingResult;
    use crate::services::routing::MockRoutingService;
    use crate::types::{DutyStatus, SheetSegment};

    /// Geocoder that knows a handful of cities
    struct KnownPlaces(HashMap<&'static str, (f64, f64, &'static str)>);

    impl KnownPlaces {
        fn new() -> Self {
            let mut places = HashMap::new();
            places.insert("Dallas, TX", (32.7767, -96.7970, "Dallas, Dallas County, Texas, United States"));
            places.insert("Oklahoma City, OK", (35.4676, -97.5164, "Oklahoma City, Oklahoma County, Oklahoma, United States"));
            places.insert("Denver, CO", (39.7392, -104.9903, "Denver, Colorado, United States"));
            places.insert("Seattle, WA", (47.6062, -122.3321, "Seattle, King County, Washington, United States"));
            places.insert("Fort Worth, TX", (32.7555, -97.3308, "Fort Worth, Tarrant County, Texas, United States"));
            Self(places)
        }
    }

    #[async_trait]
    impl Geocoder for KnownPlaces {
        async fn geocode(&self, query: &str) -> Result<Option<GeocodingResult>> {
            if query == "explode" {
                anyhow::bail!("geocoder exploded");
            }
            Ok(self.0.get(query).map(|(lat, lng, name)| GeocodingResult {
                coordinates: Coordinates { lat: *lat, lng: *lng },
                confidence: 1.0,
                display_name: name.to_string(),
            }))
        }

        fn name(&self) -> &'static str {
            "known-places"
        }
    }

    struct NoRoutes;

    #[async_trait]
    impl RoutingService for NoRoutes {
        async fn route(&self, _waypoints: &[Coordinates]) -> Result<Route> {
            anyhow::bail!("no route found")
        }

        fn name(&self) -> &str {
            "no-routes"
        }
    }

    fn planner() -> TripPlanner {
        TripPlanner::new(Arc::new(KnownPlaces::new()), Arc::new(MockRoutingService::new()))
    }

    fn request(current: &str, pickup: &str, dropoff: &str, cycle: f64) -> PlanTripRequest {
        PlanTripRequest {
            current_location: current.to_string(),
            pickup_location: pickup.to_string(),
            dropoff_location: dropoff.to_string(),
            current_cycle_used_hours: cycle,
            start_time_iso: Some("2026-03-02T08:00:00-06:00".to_string()),
        }
    }

    async fn mock_route(names: [&str; 3]) -> Route {
        let geocoder = KnownPlaces::new();
        let mut waypoints = Vec::new();
        for name in names {
            waypoints.push(geocoder.geocode(name).await.unwrap().unwrap().coordinates);
        }
        MockRoutingService::new().route(&waypoints).await.unwrap()
    }

    fn on_grid(label: &str) -> bool {
        label
            .split_once(':')
            .and_then(|(_, m)| m.parse::<u32>().ok())
            .map(|m| m % 5 == 0)
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn plans_multi_day_trip_end_to_end() {
        let response = planner()
            .plan(&request("Dallas, TX", "Oklahoma City, OK", "Denver, CO", 0.0))
            .await
            .unwrap();

        let route = mock_route(["Dallas, TX", "Oklahoma City, OK", "Denver, CO"]).await;
        assert_eq!(response.summary.distance_miles, round_to(route.distance_miles(), 1));
        assert_eq!(response.summary.drive_hours, round_to(route.duration_hours(), 2));
        assert_eq!(response.summary.cycle_max_hours, 70.0);
        assert!(!response.summary.cycle_exceeded);
        assert_eq!(response.polyline, route.polyline);

        assert_eq!(response.places.pickup.display_name, "Oklahoma City, Oklahoma County, Oklahoma, United States");

        // Chronological order
        for pair in response.stops.windows(2) {
            assert!(pair[0].at <= pair[1].at);
        }

        let first = &response.stops[0];
        assert_eq!(first.kind, StopKind::PickupOnDuty);
        assert_eq!(first.at.to_rfc3339(), "2026-03-02T08:00:00-06:00");
        assert_eq!((first.lat, first.lng), (35.4676, -97.5164));
        assert_eq!(first.near.as_deref(), Some("Oklahoma City, Oklahoma County, Oklahoma, United States"));

        let last = response.stops.last().unwrap();
        assert_eq!(last.kind, StopKind::DropoffOnDuty);
        assert_eq!((last.lat, last.lng), (39.7392, -104.9903));

        // More than 11 h of driving needs an overnight rest placed on the route.
        let rests: Vec<_> = response.stops.iter().filter(|s| s.kind == StopKind::OvernightOff).collect();
        assert!(!rests.is_empty());
        for rest in rests {
            assert!(rest.near.is_none());
            assert!(rest.lat > 32.0 && rest.lat < 40.0 && rest.lng > -105.5 && rest.lng < -96.0);
        }

        assert!(response.days.len() >= 2);
        for day in &response.days {
            let hours: f64 = day.totals.off_duty + day.totals.sleeper_berth + day.totals.driving + day.totals.on_duty;
            assert!((hours - 24.0).abs() < 1e-9);
            assert_eq!(day.segments.first().map(|s| s.from.as_str()), Some("00:00"));
            assert_eq!(day.segments.last().map(|s| s.to.as_str()), Some("24:00"));
            for segment in &day.segments {
                assert!(on_grid(&segment.from) && on_grid(&segment.to), "{:?}", segment);
            }
        }

        let first_day = &response.days[0];
        assert_eq!(first_day.date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(
            first_day.segments[..2],
            [
                SheetSegment { status: DutyStatus::OffDuty, from: "00:00".into(), to: "08:00".into() },
                SheetSegment { status: DutyStatus::OnDutyNotDriving, from: "08:00".into(), to: "09:00".into() },
            ]
        );
        assert_eq!(first_day.labels[0], TimeLabel {
            time: "08:00".into(),
            text: "Pre-trip/TIV — Oklahoma City, OK".into(),
        });
        assert!(first_day.labels.iter().any(|l| l.text == "30-min break"));
        assert!(first_day.labels.iter().any(|l| l.text == "10-hr break"));

        let last_day = response.days.last().unwrap();
        assert!(last_day.labels.iter().any(|l| l.text == "Post-trip/TIV — Denver, CO"));
    }

    #[tokio::test]
    async fn long_routes_get_fuel_stops_every_thousand_miles() {
        let response = planner()
            .plan(&request("Dallas, TX", "Oklahoma City, OK", "Seattle, WA", 0.0))
            .await
            .unwrap();

        let expected = (response.summary.distance_miles / FUEL_INTERVAL_MILES).floor() as usize;
        assert!(expected >= 2, "route only {} miles", response.summary.distance_miles);

        let fuel: Vec<_> = response.stops.iter().filter(|s| s.kind == StopKind::FuelStop).collect();
        assert_eq!(fuel.len(), expected);
        for pair in fuel.windows(2) {
            assert!(pair[0].at < pair[1].at);
        }
        for stop in &fuel {
            assert_eq!(stop.duration_minutes, 0);
            assert!(stop.near.is_none());
        }
        assert!(response.days.iter().any(|d| d.labels.iter().any(|l| l.text == "Fuel stop")));
    }

    #[tokio::test]
    async fn short_routes_have_no_fuel_stops() {
        let response = planner()
            .plan(&request("Dallas, TX", "Fort Worth, TX", "Oklahoma City, OK", 0.0))
            .await
            .unwrap();

        assert!(response.summary.distance_miles < FUEL_INTERVAL_MILES);
        assert!(response.stops.iter().all(|s| s.kind != StopKind::FuelStop));
        assert_eq!(response.days.len(), 1);
    }

    #[tokio::test]
    async fn cycle_exceedance_is_flagged() {
        let response = planner()
            .plan(&request("Dallas, TX", "Oklahoma City, OK", "Denver, CO", 65.0))
            .await
            .unwrap();
        assert!(response.summary.cycle_exceeded);
        assert!(response.summary.cycle_used_hours > 70.0);
    }

    #[tokio::test]
    async fn every_missing_place_is_reported() {
        let err = planner()
            .plan(&request("Dallas, TX", "Atlantis", "explode", 0.0))
            .await
            .unwrap_err();

        match &err {
            TripPlanError::PlacesNotFound(failures) => {
                let fields: Vec<_> = failures.iter().map(|f| f.field).collect();
                assert_eq!(fields, vec!["pickupLocation", "dropoffLocation"]);
            }
            other => panic!("unexpected error {:?}", other),
        }

        let details = err.details().unwrap();
        assert_eq!(
            details["pickupLocation"][0],
            "We couldn't find the pickup location. Try 'City, ST' or a full address."
        );
        assert!(details.get("currentLocation").is_none());
        assert_eq!(err.to_string(), "places not found: pickupLocation, dropoffLocation");
    }

    #[tokio::test]
    async fn routing_failure_is_route_unavailable() {
        let planner = TripPlanner::new(Arc::new(KnownPlaces::new()), Arc::new(NoRoutes));
        let err = planner
            .plan(&request("Dallas, TX", "Oklahoma City, OK", "Denver, CO", 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TripPlanError::RouteUnavailable(ref msg) if msg.contains("no route")));
        assert!(err.details().is_none());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_lookup() {
        let err = planner()
            .plan(&request("Atlantis", "Atlantis", "Atlantis", -3.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TripPlanError::Plan(PlanError::InvalidInput(_))));

        let mut bad_start = request("Dallas, TX", "Oklahoma City, OK", "Denver, CO", 0.0);
        bad_start.start_time_iso = Some("yesterday-ish".to_string());
        let err = planner().plan(&bad_start).await.unwrap_err();
        assert!(matches!(err, TripPlanError::Plan(PlanError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn missing_start_time_defaults_to_eight_utc() {
        let mut req = request("Dallas, TX", "Fort Worth, TX", "Oklahoma City, OK", 0.0);
        req.start_time_iso = None;
        let now = DateTime::parse_from_rfc3339("2026-03-02T15:20:00Z").unwrap().with_timezone(&Utc);

        let response = planner().plan_at(&req, now).await.unwrap();
        assert_eq!(response.stops[0].at.to_rfc3339(), "2026-03-02T08:00:00+00:00");
    }

    #[test]
    fn compact_place_shortens_us_display_names() {
        assert_eq!(compact_place("Dallas, Dallas County, Texas, United States"), "Dallas, TX");
        assert_eq!(compact_place("Dallas, Dallas County, Texas, 75201, United States"), "Dallas, TX");
        assert_eq!(compact_place("Santa Fe, Santa Fe County, New Mexico, United States"), "Santa Fe, NM");
        assert_eq!(compact_place("Toronto, Ontario, Canada"), "Toronto, CA");
        assert_eq!(compact_place("Springfield, 62701"), "Springfield, 62701");
        assert_eq!(compact_place("Texas"), "Texas");
        assert_eq!(compact_place(""), "");
    }

    fn trip_stops(schedule: &ScheduleResult) -> Vec<TripStop> {
        schedule
            .stops
            .iter()
            .map(|stop| TripStop {
                kind: stop.kind,
                at: stop.at,
                duration_minutes: stop.duration_minutes,
                lat: 0.0,
                lng: 0.0,
                near: (stop.kind == StopKind::PickupOnDuty).then(String::new),
            })
            .collect()
    }

    #[test]
    fn labels_follow_their_duty_day() {
        let start = DateTime::parse_from_rfc3339("2026-03-02T08:00:00+00:00").unwrap();
        let schedule = compute_schedule(15.0, start, 0.0).unwrap();

        let labels = sheet_labels(&schedule, &trip_stops(&schedule));
        assert_eq!(
            labels,
            vec![
                vec![
                    TimeLabel { time: "08:00".into(), text: "Pre-trip/TIV — Pickup".into() },
                    TimeLabel { time: "17:00".into(), text: "30-min break".into() },
                    TimeLabel { time: "20:30".into(), text: "10-hr break".into() },
                ],
                vec![TimeLabel { time: "10:30".into(), text: "Post-trip/TIV — Dropoff".into() }],
            ]
        );
    }

    #[test]
    fn sheets_sharing_a_date_get_their_own_labels() {
        // Rest ends at 22:30 the same day, so both sheets are dated 2026-03-02.
        let start = DateTime::parse_from_rfc3339("2026-03-02T00:00:00+00:00").unwrap();
        let schedule = compute_schedule(15.0, start, 0.0).unwrap();
        assert_eq!(schedule.days.len(), 2);
        assert_eq!(schedule.days[0].date, schedule.days[1].date);

        let labels = sheet_labels(&schedule, &trip_stops(&schedule));
        let texts: Vec<&str> = labels[0].iter().map(|label| label.text.as_str()).collect();
        assert_eq!(texts, vec!["Pre-trip/TIV — Pickup", "30-min break", "10-hr break"]);
        assert_eq!(
            labels[1],
            vec![TimeLabel { time: "02:30".into(), text: "Post-trip/TIV — Dropoff".into() }]
        );
    }

    #[test]
    fn rounding_helper() {
        assert_eq!(round_to(1234.5678, 1), 1234.6);
        assert_eq!(round_to(18.104_999, 2), 18.1);
    }
}
