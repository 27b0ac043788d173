use chrono::{Duration, FixedOffset, NaiveTime, Offset, Utc};

/// Local hour a trip starts at when the caller gives no start time.
pub const DEFAULT_START_HOUR: u32 = 8;

/// Zone assumed for start times that carry no offset.
pub fn default_zone() -> FixedOffset {
    Utc.fix()
}

pub fn default_start_time() -> NaiveTime {
    NaiveTime::MIN + Duration::hours(i64::from(DEFAULT_START_HOUR))
}
