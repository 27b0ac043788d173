//! Time-of-day labels, display quantization and start time resolution.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

use crate::defaults::{default_start_time, default_zone};
use crate::error::{PlanError, PlanResult};
use crate::types::DAY_MINUTES;

/// Display grid for log sheet boundaries, in minutes.
pub const QUANTUM_MINUTES: f64 = 5.0;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an "HH:MM" label into minutes since midnight, clamped to [0, 1440].
pub fn parse_clock(label: &str) -> PlanResult<f64> {
    let label = label.trim();
    let (hours, minutes) = label
        .split_once(':')
        .ok_or_else(|| PlanError::invalid(format!("expected HH:MM, got '{}'", label)))?;

    let hours: u32 = hours
        .parse()
        .map_err(|_| PlanError::invalid(format!("invalid hour in '{}'", label)))?;
    let minutes: u32 = minutes
        .parse()
        .map_err(|_| PlanError::invalid(format!("invalid minute in '{}'", label)))?;

    Ok((f64::from(hours) * 60.0 + f64::from(minutes)).clamp(0.0, DAY_MINUTES))
}

/// Snap minutes to the nearest display quantum, clamped to the day.
///
/// Seconds are dropped before rounding, so 08:02:50 snaps to 08:00.
pub fn quantize_minutes(minutes: f64) -> f64 {
    // Absorb microsecond noise from instant arithmetic before flooring.
    let whole = (minutes + 1e-6).floor();
    ((whole / QUANTUM_MINUTES).round() * QUANTUM_MINUTES).clamp(0.0, DAY_MINUTES)
}

/// Format minutes as "HH:MM" on the display grid; 1440 is "24:00".
pub fn format_clock(minutes: f64) -> String {
    let quantized = quantize_minutes(minutes) as u32;
    format!("{:02}:{:02}", quantized / 60, quantized % 60)
}

/// Format an instant's local time of day, unquantized.
pub fn format_time_of_day(instant: &DateTime<FixedOffset>) -> String {
    instant.format("%H:%M").to_string()
}

/// Minutes from the start of `date` (in the instant's own offset) to `instant`.
///
/// The result may exceed 1440 for instants past the following midnight.
pub fn minutes_since_midnight(date: NaiveDate, instant: &DateTime<FixedOffset>) -> f64 {
    let elapsed = instant.naive_local() - date.and_time(NaiveTime::MIN);
    elapsed.num_seconds() as f64 / 60.0 + f64::from(elapsed.subsec_nanos()) / 60e9
}

/// Position of `instant` on the log sheet of `date`.
///
/// Exactly the next midnight maps to the 1440 sentinel; later instants wrap
/// onto the start of the sheet, which the normalizer then splits.
pub fn sheet_minutes(date: NaiveDate, instant: &DateTime<FixedOffset>) -> f64 {
    let minutes = minutes_since_midnight(date, instant);
    if minutes > DAY_MINUTES {
        minutes % DAY_MINUTES
    } else {
        minutes
    }
}

/// Duration of a fractional number of hours, at microsecond resolution.
pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::microseconds((hours * 3_600_000_000.0).round() as i64)
}

/// Hours between two instants.
pub fn duration_hours(from: &DateTime<FixedOffset>, to: &DateTime<FixedOffset>) -> f64 {
    let elapsed = *to - *from;
    elapsed.num_seconds() as f64 / 3600.0 + f64::from(elapsed.subsec_nanos()) / 3.6e12
}

/// Resolve the trip start from an optional caller-supplied value.
pub fn parse_start_time(value: Option<&str>) -> PlanResult<DateTime<FixedOffset>> {
    resolve_start_time(value, Utc::now())
}

/// Resolve the trip start against an explicit "now".
///
/// Missing or blank input means today at the default start hour in the default
/// zone. Values without an offset are taken to be in the default zone.
pub fn resolve_start_time(
    value: Option<&str>,
    now: DateTime<Utc>,
) -> PlanResult<DateTime<FixedOffset>> {
    let zone = default_zone();

    let value = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => {
            let today = now.with_timezone(&zone).date_naive();
            return Ok(in_zone(&zone, today.and_time(default_start_time())));
        }
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Ok(parsed);
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(in_zone(&zone, naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(in_zone(&zone, date.and_time(NaiveTime::MIN)));
    }

    Err(PlanError::invalid(format!("unparseable start time '{}'", value)))
}

fn in_zone(zone: &FixedOffset, naive: NaiveDateTime) -> DateTime<FixedOffset> {
    // A fixed offset has exactly one mapping for every local time.
    let utc = naive - Duration::seconds(i64::from(zone.local_minus_utc()));
    zone.from_utc_datetime(&utc)
}
