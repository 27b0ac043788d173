//! Hours-of-service duty schedule computation.
//!
//! Given the total driving a trip needs, when it starts, and how much of the
//! 70-hour cycle the driver has already used, this module walks forward in
//! time and lays out a compliant plan: pickup bracket, driving chunks, 30
//! minute breaks, 10 hour overnight rests and the dropoff bracket. Each duty
//! day is reported as a normalized log sheet plus a list of stop events.
//!
//! The walk is greedy: drive as much as is legal, break when the 8 hour
//! threshold is hit, close the day when either the 11 hour driving cap or the
//! 14 hour duty window is exhausted.
//!
//! # Dropoff policy
//!
//! When driving finishes but the 1 hour dropoff bracket no longer fits in the
//! duty window, the dropoff is moved to right after the next overnight rest
//! and nothing else is scheduled before it. The dropoff day is closed on its
//! own and the schedule ends there.

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::debug;

use crate::error::{PlanError, PlanResult};
use crate::services::clock::{duration_hours, hours_to_duration, minutes_since_midnight, sheet_minutes};
use crate::services::segments::normalize;
use crate::types::{
    CycleSummary, DriveLeg, DutyDay, DutyStatus, ScheduleResult, Segment, StatusTotals, StopEvent,
    StopKind, DAY_MINUTES,
};

/// Maximum driving per duty day (hours).
pub const MAX_DRIVE_PER_DAY_HOURS: f64 = 11.0;
/// Maximum on-duty window per duty day (hours).
pub const MAX_DUTY_WINDOW_HOURS: f64 = 14.0;
/// Driving allowed before a break is mandatory (hours).
pub const BREAK_AFTER_DRIVE_HOURS: f64 = 8.0;
/// Mandatory break length (hours).
pub const BREAK_HOURS: f64 = 0.5;
/// Mandatory rest between duty days (hours).
pub const OVERNIGHT_REST_HOURS: f64 = 10.0;
/// Rolling 8-day cycle cap (hours).
pub const CYCLE_MAX_HOURS: f64 = 70.0;
/// Pickup and dropoff on-duty bracket length (hours).
pub const BRACKET_HOURS: f64 = 1.0;

/// Tolerance for every limit comparison ("reached" means `v >= limit - EPSILON`).
pub const EPSILON: f64 = 1e-9;
/// Driving left below this is treated as done.
pub const REMAINING_DRIVE_EPSILON: f64 = 1e-6;

/// The regulatory limits a schedule is computed against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HosRules {
    pub max_drive_per_day: f64,
    pub max_duty_window: f64,
    pub break_after_drive: f64,
    pub break_hours: f64,
    pub overnight_rest: f64,
    pub cycle_max: f64,
    pub bracket: f64,
}

impl HosRules {
    /// Property-carrying driver, 70 hours / 8 days.
    pub(crate) const PROPERTY_70_8: HosRules = HosRules {
        max_drive_per_day: MAX_DRIVE_PER_DAY_HOURS,
        max_duty_window: MAX_DUTY_WINDOW_HOURS,
        break_after_drive: BREAK_AFTER_DRIVE_HOURS,
        break_hours: BREAK_HOURS,
        overnight_rest: OVERNIGHT_REST_HOURS,
        cycle_max: CYCLE_MAX_HOURS,
        bracket: BRACKET_HOURS,
    };
}

/// Compute the duty schedule for a trip.
///
/// Fails only on invalid input. A schedule that exceeds the cycle cap is still
/// returned in full, with `summary.cycle_exceeded` set.
pub fn compute_schedule(
    total_drive_hours: f64,
    start: DateTime<FixedOffset>,
    current_cycle_used_hours: f64,
) -> PlanResult<ScheduleResult> {
    compute_schedule_with(&HosRules::PROPERTY_70_8, total_drive_hours, start, current_cycle_used_hours)
}

pub(crate) fn compute_schedule_with(
    rules: &HosRules,
    total_drive_hours: f64,
    start: DateTime<FixedOffset>,
    current_cycle_used_hours: f64,
) -> PlanResult<ScheduleResult> {
    if !total_drive_hours.is_finite() || total_drive_hours < 0.0 {
        return Err(PlanError::invalid(format!(
            "total drive hours must be a non-negative number, got {}",
            total_drive_hours
        )));
    }
    if !current_cycle_used_hours.is_finite() || current_cycle_used_hours < 0.0 {
        return Err(PlanError::invalid(format!(
            "cycle hours used must be a non-negative number, got {}",
            current_cycle_used_hours
        )));
    }

    let result = Planner::new(rules, total_drive_hours, start, current_cycle_used_hours).run();

    debug!(
        "Scheduled {:.2} h of driving over {} duty day(s), cycle {:.2}/{:.0} h",
        total_drive_hours,
        result.days.len(),
        result.summary.cycle_used_hours,
        result.summary.cycle_max_hours
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Planner state
// ---------------------------------------------------------------------------

/// Counters and raw segments of the duty day being built.
#[derive(Debug)]
struct OpenDay {
    date: NaiveDate,
    segments: Vec<Segment>,
    drive_today: f64,
    duty_elapsed: f64,
    since_break_drive: f64,
}

impl OpenDay {
    fn drive_cap_reached(&self, rules: &HosRules) -> bool {
        self.drive_today >= rules.max_drive_per_day - EPSILON
    }

    fn window_reached(&self, rules: &HosRules) -> bool {
        self.duty_elapsed >= rules.max_duty_window - EPSILON
    }

    fn break_due(&self, rules: &HosRules) -> bool {
        self.since_break_drive >= rules.break_after_drive - EPSILON
    }

    /// Driving still permitted today by the daily cap and the duty window.
    fn drive_left(&self, rules: &HosRules) -> f64 {
        (rules.max_drive_per_day - self.drive_today).min(rules.max_duty_window - self.duty_elapsed)
    }

    fn bracket_fits(&self, rules: &HosRules) -> bool {
        self.duty_elapsed + rules.bracket <= rules.max_duty_window + EPSILON
    }
}

/// Explicit state of the schedule walk.
struct Planner<'r> {
    rules: &'r HosRules,
    /// Logical clock; never moved by end-of-day padding.
    cursor: DateTime<FixedOffset>,
    remaining_drive: f64,
    cycle_used: f64,
    first_day: bool,
    days: Vec<DutyDay>,
    stops: Vec<StopEvent>,
    drive_legs: Vec<DriveLeg>,
}

impl<'r> Planner<'r> {
    fn new(
        rules: &'r HosRules,
        total_drive_hours: f64,
        start: DateTime<FixedOffset>,
        cycle_used: f64,
    ) -> Self {
        Self {
            rules,
            cursor: start,
            remaining_drive: total_drive_hours,
            cycle_used,
            first_day: true,
            days: Vec::new(),
            stops: Vec::new(),
            drive_legs: Vec::new(),
        }
    }

    fn run(mut self) -> ScheduleResult {
        // No driving means no trip: no duty days and the cycle stays as given.
        while !self.driving_done() {
            let mut day = self.open_day();

            if self.first_day {
                self.first_day = false;
                self.on_duty_bracket(&mut day, StopKind::PickupOnDuty);
            }

            self.drive(&mut day);

            let finished = self.driving_done();
            let dropoff_deferred = finished && !day.bracket_fits(self.rules);
            if finished && !dropoff_deferred {
                self.on_duty_bracket(&mut day, StopKind::DropoffOnDuty);
            }

            let off_duty_from = self.cursor;
            self.close_day(day);

            if finished && !dropoff_deferred {
                break;
            }

            self.overnight_rest(off_duty_from);

            if dropoff_deferred {
                let mut day = self.open_day();
                self.on_duty_bracket(&mut day, StopKind::DropoffOnDuty);
                self.close_day(day);
                break;
            }
        }

        let cycle_exceeded = self.cycle_used > self.rules.cycle_max + EPSILON;
        ScheduleResult {
            days: self.days,
            stops: self.stops,
            drive_legs: self.drive_legs,
            summary: CycleSummary {
                cycle_used_hours: self.cycle_used,
                cycle_max_hours: self.rules.cycle_max,
                cycle_exceeded,
            },
        }
    }

    fn driving_done(&self) -> bool {
        self.remaining_drive <= REMAINING_DRIVE_EPSILON
    }

    fn open_day(&self) -> OpenDay {
        OpenDay {
            date: self.cursor.date_naive(),
            segments: Vec::new(),
            drive_today: 0.0,
            duty_elapsed: 0.0,
            since_break_drive: 0.0,
        }
    }

    /// Append `hours` of `status` at the cursor and advance it. On-duty time
    /// counts toward the cycle. Returns the start.
    fn advance(&mut self, day: &mut OpenDay, status: DutyStatus, hours: f64) -> DateTime<FixedOffset> {
        if status.is_on_duty() {
            self.cycle_used += hours;
        }
        let from = self.cursor;
        let to = from + hours_to_duration(hours);
        day.segments.push(Segment::new(
            status,
            sheet_minutes(day.date, &from),
            sheet_minutes(day.date, &to),
        ));
        self.cursor = to;
        from
    }

    fn record_stop(&mut self, kind: StopKind, at: DateTime<FixedOffset>, hours: f64) {
        self.stops.push(StopEvent {
            kind,
            at,
            duration_minutes: (hours * 60.0).round() as u32,
        });
    }

    /// Pickup or dropoff: one on-duty, not-driving bracket.
    fn on_duty_bracket(&mut self, day: &mut OpenDay, kind: StopKind) {
        let hours = self.rules.bracket;
        let at = self.advance(day, DutyStatus::OnDutyNotDriving, hours);
        day.duty_elapsed += hours;
        self.record_stop(kind, at, hours);
    }

    /// Drive until the trip is done or the day's limits are used up.
    fn drive(&mut self, day: &mut OpenDay) {
        let rules = self.rules;

        while !self.driving_done() {
            if day.break_due(rules) {
                let at = self.advance(day, DutyStatus::OffDuty, rules.break_hours);
                day.duty_elapsed += rules.break_hours;
                day.since_break_drive = 0.0;
                self.record_stop(StopKind::Break30Min, at, rules.break_hours);
                if day.window_reached(rules) {
                    break;
                }
            }

            let drive_left = day.drive_left(rules);
            if drive_left <= EPSILON {
                break;
            }

            let mut chunk = self
                .remaining_drive
                .min(drive_left)
                .min(rules.break_after_drive - day.since_break_drive);
            if chunk <= EPSILON {
                // Break threshold missed by rounding; drive what the day allows.
                chunk = self.remaining_drive.min(drive_left);
            }

            let at = self.advance(day, DutyStatus::Driving, chunk);
            self.drive_legs.push(DriveLeg { start: at, hours: chunk });

            self.remaining_drive -= chunk;
            day.drive_today += chunk;
            day.duty_elapsed += chunk;
            day.since_break_drive += chunk;

            if day.drive_cap_reached(rules) || day.window_reached(rules) {
                break;
            }
        }
    }

    /// Pad the sheet to midnight, normalize it and store the finished day.
    ///
    /// Padding is bookkeeping for the sheet only; the cursor stays where the
    /// last activity ended.
    fn close_day(&mut self, mut day: OpenDay) {
        if minutes_since_midnight(day.date, &self.cursor) < DAY_MINUTES {
            day.segments.push(Segment::new(
                DutyStatus::OffDuty,
                sheet_minutes(day.date, &self.cursor),
                DAY_MINUTES,
            ));
        }

        let segments = normalize(&day.segments);
        let totals = StatusTotals::from_segments(&segments);
        self.days.push(DutyDay {
            date: day.date,
            segments,
            totals,
        });
    }

    /// Ten hours off, starting where the day's activity ended (not at midnight).
    fn overnight_rest(&mut self, from: DateTime<FixedOffset>) {
        let hours = self.rules.overnight_rest;
        self.record_stop(StopKind::OvernightOff, from, hours);
        self.cursor = from + hours_to_duration(hours);
    }
}

// ---------------------------------------------------------------------------
// Driving progress along the timeline
// ---------------------------------------------------------------------------

/// Hours of driving completed strictly before `instant`.
pub fn drive_hours_before(legs: &[DriveLeg], instant: &DateTime<FixedOffset>) -> f64 {
    let mut total = 0.0;
    for leg in legs {
        if leg.start >= *instant {
            break;
        }
        total += leg.hours.min(duration_hours(&leg.start, instant));
    }
    total
}

/// Instant at which `fraction` (clamped to 0..=1) of all driving is done.
///
/// `None` when the legs contain no driving.
pub fn instant_at_drive_fraction(legs: &[DriveLeg], fraction: f64) -> Option<DateTime<FixedOffset>> {
    let total: f64 = legs.iter().map(|leg| leg.hours).sum();
    if total <= EPSILON {
        return None;
    }

    let target = fraction.clamp(0.0, 1.0) * total;
    let mut done = 0.0;
    for leg in legs {
        if done + leg.hours >= target {
            return Some(leg.start + hours_to_duration(target - done));
        }
        done += leg.hours;
    }

    legs.last().map(|leg| leg.start + hours_to_duration(leg.hours))
}

// ===========================================================================
// Tests
// ===========================================================================
