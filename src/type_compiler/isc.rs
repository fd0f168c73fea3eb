//! Firebird's ISC encoding of temporal values.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::DialectError;

/// Time units per second (100µs resolution).
pub const TIME_UNITS_PER_SECOND: u32 = 10_000;
const NANOS_PER_UNIT: u32 = 100_000;
const UNITS_PER_DAY: u32 = 86_400 * TIME_UNITS_PER_SECOND;
/// Zone id of UTC; fixed offsets are `ZONE_UTC + offset_minutes`.
pub const ZONE_UTC: u16 = 1439;
const MAX_OFFSET_MINUTES: i32 = 1439;

fn epoch() -> NaiveDate {
    // 1858-11-17 is always a valid date.
    NaiveDate::from_ymd_opt(1858, 11, 17).unwrap_or(NaiveDate::MIN)
}

fn min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn max_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

pub fn encode_date(date: NaiveDate) -> Result<i32, DialectError> {
    if date < min_date() || date > max_date() {
        return Err(DialectError::Parameter(format!(
            "date {date} is outside 0001-01-01..9999-12-31"
        )));
    }
    i32::try_from(date.signed_duration_since(epoch()).num_days())
        .map_err(|_| DialectError::Parameter(format!("date {date} out of range")))
}

pub fn decode_date(days: i32) -> Result<NaiveDate, DialectError> {
    epoch()
        .checked_add_signed(chrono::Duration::days(i64::from(days)))
        .filter(|d| *d >= min_date() && *d <= max_date())
        .ok_or_else(|| DialectError::Parameter(format!("ISC date {days} out of range")))
}

/// Encode a time of day, truncating below 100µs.
pub fn encode_time(time: NaiveTime) -> Result<u32, DialectError> {
    let nanos = time.nanosecond();
    if nanos >= 1_000_000_000 {
        return Err(DialectError::Parameter(format!(
            "leap second {time} cannot be stored"
        )));
    }
    Ok(time.num_seconds_from_midnight() * TIME_UNITS_PER_SECOND + nanos / NANOS_PER_UNIT)
}

pub fn decode_time(units: u32) -> Result<NaiveTime, DialectError> {
    if units >= UNITS_PER_DAY {
        return Err(DialectError::Parameter(format!(
            "ISC time {units} exceeds one day"
        )));
    }
    let secs = units / TIME_UNITS_PER_SECOND;
    let frac = units % TIME_UNITS_PER_SECOND;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, frac * NANOS_PER_UNIT)
        .ok_or_else(|| DialectError::Parameter(format!("ISC time {units} out of range")))
}

/// Drop precision below 100µs.
#[must_use]
pub fn truncate_time(time: NaiveTime) -> NaiveTime {
    let nanos = time.nanosecond();
    if nanos >= 1_000_000_000 {
        return time;
    }
    time.with_nanosecond(nanos - nanos % NANOS_PER_UNIT).unwrap_or(time)
}

pub fn encode_timestamp(ts: NaiveDateTime) -> Result<(i32, u32), DialectError> {
    Ok((encode_date(ts.date())?, encode_time(ts.time())?))
}

pub fn decode_timestamp(date: i32, time: u32) -> Result<NaiveDateTime, DialectError> {
    Ok(decode_date(date)?.and_time(decode_time(time)?))
}

pub fn encode_zone(offset: FixedOffset) -> Result<u16, DialectError> {
    let seconds = offset.local_minus_utc();
    if seconds % 60 != 0 {
        return Err(DialectError::Parameter(format!(
            "offset {offset} is not a whole number of minutes"
        )));
    }
    let minutes = seconds / 60;
    if minutes.abs() > MAX_OFFSET_MINUTES {
        return Err(DialectError::Parameter(format!("offset {offset} out of range")));
    }
    u16::try_from(i32::from(ZONE_UTC) + minutes)
        .map_err(|_| DialectError::Parameter(format!("offset {offset} out of range")))
}

pub fn decode_zone(zone: u16) -> Result<FixedOffset, DialectError> {
    let minutes = i32::from(zone) - i32::from(ZONE_UTC);
    if minutes.abs() > MAX_OFFSET_MINUTES {
        return Err(DialectError::Parameter(format!(
            "zone id {zone} names a region, only fixed offsets are supported"
        )));
    }
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| DialectError::Parameter(format!("zone id {zone} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_day_zero() {
        assert_eq!(encode_date(NaiveDate::from_ymd_opt(1858, 11, 17).unwrap()).unwrap(), 0);
        assert_eq!(encode_date(NaiveDate::from_ymd_opt(1858, 11, 18).unwrap()).unwrap(), 1);
        assert_eq!(
            encode_date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).unwrap(),
            51_544
        );
    }

    #[test]
    fn time_truncates_to_100_micros() {
        let t = NaiveTime::from_hms_nano_opt(12, 30, 15, 123_456_789).unwrap();
        let units = encode_time(t).unwrap();
        assert_eq!(units, (12 * 3600 + 30 * 60 + 15) * 10_000 + 1234);
        assert_eq!(decode_time(units).unwrap(), truncate_time(t));
        assert_eq!(
            truncate_time(t),
            NaiveTime::from_hms_micro_opt(12, 30, 15, 123_400).unwrap()
        );
    }

    #[test]
    fn zone_ids() {
        assert_eq!(encode_zone(FixedOffset::east_opt(0).unwrap()).unwrap(), 1439);
        assert_eq!(encode_zone(FixedOffset::east_opt(3 * 3600).unwrap()).unwrap(), 1619);
        assert_eq!(encode_zone(FixedOffset::west_opt(5 * 3600).unwrap()).unwrap(), 1139);
        assert!(decode_zone(65_000).is_err());
        assert!(encode_zone(FixedOffset::east_opt(30).unwrap()).is_err());
    }

    #[test]
    fn date_bounds() {
        assert!(encode_date(NaiveDate::from_ymd_opt(1, 1, 1).unwrap()).is_ok());
        assert!(encode_date(NaiveDate::from_ymd_opt(9999, 12, 31).unwrap()).is_ok());
        assert!(encode_date(NaiveDate::from_ymd_opt(10_000, 1, 1).unwrap()).is_err());
    }
}
