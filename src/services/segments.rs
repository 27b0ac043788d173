//! Log sheet segment normalization.
//!
//! Turns an arbitrary list of day segments (overlapping, gapped, crossing
//! midnight, or empty) into the canonical form every consumer relies on:
//! sorted, non-overlapping, covering 00:00..24:00 with no gaps, and with no
//! two neighbours sharing a status.

use crate::types::{DutyStatus, Segment, DAY_MINUTES};

/// Boundaries closer than this (in minutes) are treated as equal.
const MINUTE_EPSILON: f64 = 1e-9;

/// Normalize one day's segments. Idempotent.
///
/// Overlaps are resolved in favour of the segment that starts earlier; a
/// segment whose end is at or before its start wraps past midnight and is
/// split into its evening and morning pieces.
pub fn normalize(segments: &[Segment]) -> Vec<Segment> {
    let mut pieces: Vec<Segment> = Vec::with_capacity(segments.len() + 1);

    for segment in segments {
        let start = clamp_to_day(segment.from);
        let end = clamp_to_day(segment.to);

        if (end - start).abs() <= MINUTE_EPSILON {
            continue;
        }

        if end < start {
            pieces.push(Segment::new(segment.status, start, DAY_MINUTES));
            pieces.push(Segment::new(segment.status, 0.0, end));
        } else {
            pieces.push(Segment::new(segment.status, start, end));
        }
    }

    // Stable: equal starts keep input order, so earlier-emitted wins overlaps.
    pieces.sort_by(|a, b| a.from.total_cmp(&b.from));

    let mut out: Vec<Segment> = Vec::with_capacity(pieces.len() * 2 + 1);
    let mut last_end = 0.0;

    for piece in pieces {
        let mut start = piece.from.max(last_end);
        let end = piece.to;

        if end - start <= MINUTE_EPSILON {
            continue;
        }

        if start - last_end > MINUTE_EPSILON {
            push_merged(&mut out, Segment::new(DutyStatus::OffDuty, last_end, start));
        } else {
            start = last_end;
        }

        push_merged(&mut out, Segment::new(piece.status, start, end));
        last_end = end;
    }

    if DAY_MINUTES - last_end > MINUTE_EPSILON {
        push_merged(&mut out, Segment::new(DutyStatus::OffDuty, last_end, DAY_MINUTES));
    } else if let Some(last) = out.last_mut() {
        last.to = DAY_MINUTES;
    }

    out
}

/// True when `segments` already satisfy the normalized invariants.
pub fn is_normalized(segments: &[Segment]) -> bool {
    let Some(first) = segments.first() else {
        return false;
    };
    let Some(last) = segments.last() else {
        return false;
    };
    if first.from != 0.0 || last.to != DAY_MINUTES {
        return false;
    }

    segments.iter().all(|s| s.from < s.to)
        && segments
            .windows(2)
            .all(|pair| pair[0].to == pair[1].from && pair[0].status != pair[1].status)
}

fn clamp_to_day(minutes: f64) -> f64 {
    minutes.clamp(0.0, DAY_MINUTES)
}

fn push_merged(out: &mut Vec<Segment>, segment: Segment) {
    if let Some(last) = out.last_mut() {
        if last.status == segment.status && (last.to - segment.from).abs() <= MINUTE_EPSILON {
            last.to = segment.to;
            return;
        }
    }
    out.push(segment);
}
