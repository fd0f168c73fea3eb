use chrono::{DateTime, FixedOffset, NaiveTime, SecondsFormat, TimeZone, Timelike};

use super::ddl::{DEGRADED_TEXT_LENGTH, check_numeric};
use super::isc;
use crate::capability::CapabilityDescriptor;
use crate::driver::DbValue;
use crate::error::DialectError;
use crate::types::{Decimal, RowValues, SqlType};

fn mismatch(ty: &SqlType, value: &RowValues) -> DialectError {
    DialectError::Parameter(format!("cannot bind {} as {ty:?}", value.kind()))
}

fn bad_column(ty: &SqlType, value: &DbValue) -> DialectError {
    DialectError::Parameter(format!("driver returned {} for {ty:?}", value.kind()))
}

pub(super) fn encode(
    caps: &CapabilityDescriptor,
    ty: &SqlType,
    value: &RowValues,
) -> Result<DbValue, DialectError> {
    if value.is_null() {
        return Ok(DbValue::Null);
    }
    match ty {
        SqlType::SmallInteger => {
            let v = integer(ty, value)?;
            i16::try_from(v)
                .map(DbValue::SmallInt)
                .map_err(|_| DialectError::Parameter(format!("{v} does not fit SMALLINT")))
        }
        SqlType::Integer => {
            let v = integer(ty, value)?;
            i32::try_from(v)
                .map(DbValue::Integer)
                .map_err(|_| DialectError::Parameter(format!("{v} does not fit INTEGER")))
        }
        SqlType::BigInteger => {
            let v = integer(ty, value)?;
            i64::try_from(v)
                .map(DbValue::BigInt)
                .map_err(|_| DialectError::Parameter(format!("{v} does not fit BIGINT")))
        }
        SqlType::Int128 => {
            let v = integer(ty, value)?;
            if caps.int128 {
                Ok(DbValue::Int128(v))
            } else {
                Ok(DbValue::Text(v.to_string()))
            }
        }
        SqlType::Float => match value {
            RowValues::Float(v) => {
                #[allow(clippy::cast_possible_truncation)]
                let narrowed = *v as f32;
                if v.is_finite() && !narrowed.is_finite() {
                    return Err(DialectError::Parameter(format!("{v} overflows FLOAT")));
                }
                if !v.is_nan() && f64::from(narrowed) != *v {
                    return Err(DialectError::Parameter(format!(
                        "{v} is not exactly representable as FLOAT; bind it as DOUBLE PRECISION"
                    )));
                }
                Ok(DbValue::Float(narrowed))
            }
            _ => Err(mismatch(ty, value)),
        },
        SqlType::Double => match value {
            RowValues::Float(v) => Ok(DbValue::Double(*v)),
            _ => Err(mismatch(ty, value)),
        },
        SqlType::Numeric { precision, scale } => {
            check_numeric(caps, *precision, *scale)?;
            let decimal = match value {
                RowValues::Decimal(d) => *d,
                RowValues::Int(i) => Decimal::new(i128::from(*i), 0)?,
                RowValues::Int128(i) => Decimal::new(*i, 0)?,
                _ => return Err(mismatch(ty, value)),
            };
            let rescaled = decimal.rescale(*scale).ok_or_else(|| {
                DialectError::Parameter(format!(
                    "{decimal} cannot be stored exactly with scale {scale}"
                ))
            })?;
            if rescaled.precision() > *precision {
                return Err(DialectError::Parameter(format!(
                    "{decimal} exceeds NUMERIC({precision}, {scale})"
                )));
            }
            Ok(DbValue::Scaled {
                value: rescaled.unscaled(),
                scale: *scale,
            })
        }
        SqlType::Boolean => {
            let b = match value {
                RowValues::Bool(b) => *b,
                _ => return Err(mismatch(ty, value)),
            };
            if caps.boolean {
                Ok(DbValue::Boolean(b))
            } else {
                Ok(DbValue::SmallInt(i16::from(b)))
            }
        }
        SqlType::String { .. }
        | SqlType::Char { .. }
        | SqlType::NVarchar { .. }
        | SqlType::NChar { .. } => {
            let text = value.as_text().ok_or_else(|| mismatch(ty, value))?;
            check_length(ty, text)?;
            Ok(DbValue::Text(text.to_string()))
        }
        SqlType::Enum { variants, .. } => {
            let text = value.as_text().ok_or_else(|| mismatch(ty, value))?;
            if !variants.iter().any(|v| v == text) {
                return Err(DialectError::Parameter(format!(
                    "`{text}` is not one of {variants:?}"
                )));
            }
            Ok(DbValue::Text(text.to_string()))
        }
        SqlType::Text => {
            let text = value.as_text().ok_or_else(|| mismatch(ty, value))?;
            Ok(DbValue::Text(text.to_string()))
        }
        SqlType::Binary => {
            let bytes = value.as_blob().ok_or_else(|| mismatch(ty, value))?;
            Ok(DbValue::Bytes(bytes.to_vec()))
        }
        SqlType::Json => match value {
            RowValues::JSON(json) => serde_json::to_string(json)
                .map(DbValue::Text)
                .map_err(|e| DialectError::Parameter(format!("JSON serialization failed: {e}"))),
            _ => Err(mismatch(ty, value)),
        },
        SqlType::Date => match value {
            RowValues::Date(d) => Ok(DbValue::Date(isc::encode_date(*d)?)),
            _ => Err(mismatch(ty, value)),
        },
        SqlType::Time {
            with_time_zone: false,
        } => match value {
            RowValues::Time(t) => Ok(DbValue::Time(isc::encode_time(*t)?)),
            _ => Err(mismatch(ty, value)),
        },
        SqlType::Time {
            with_time_zone: true,
        } => match value {
            RowValues::TimeTz { time, offset } => {
                let time = isc::truncate_time(*time);
                if caps.time_zones {
                    let utc = time - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
                    Ok(DbValue::TimeTz {
                        time: isc::encode_time(utc)?,
                        zone: isc::encode_zone(*offset)?,
                    })
                } else {
                    isc::encode_zone(*offset)?;
                    Ok(DbValue::Text(format!("{}{offset}", time.format("%H:%M:%S%.f"))))
                }
            }
            _ => Err(mismatch(ty, value)),
        },
        SqlType::Timestamp {
            with_time_zone: false,
        } => match value {
            RowValues::Timestamp(ts) => {
                let (date, time) = isc::encode_timestamp(*ts)?;
                Ok(DbValue::Timestamp { date, time })
            }
            _ => Err(mismatch(ty, value)),
        },
        SqlType::Timestamp {
            with_time_zone: true,
        } => match value {
            RowValues::TimestampTz(dt) => {
                let zone = isc::encode_zone(*dt.offset())?;
                if caps.time_zones {
                    let (date, time) = isc::encode_timestamp(dt.naive_utc())?;
                    Ok(DbValue::TimestampTz { date, time, zone })
                } else {
                    isc::encode_timestamp(dt.naive_local())?;
                    let nanos = isc::truncate_time(dt.time()).nanosecond();
                    let truncated = dt.with_nanosecond(nanos).unwrap_or(*dt);
                    Ok(DbValue::Text(
                        truncated.to_rfc3339_opts(SecondsFormat::AutoSi, false),
                    ))
                }
            }
            _ => Err(mismatch(ty, value)),
        },
    }
}

pub(super) fn decode(
    ty: &SqlType,
    value: DbValue,
) -> Result<RowValues, DialectError> {
    if value.is_null() {
        return Ok(RowValues::Null);
    }
    let decoded = match (ty, value) {
        (SqlType::SmallInteger | SqlType::Integer | SqlType::BigInteger, v) => {
            match driver_integer(&v) {
                Some(i) => RowValues::Int(
                    i64::try_from(i).map_err(|_| bad_column(ty, &v))?,
                ),
                None => return Err(bad_column(ty, &v)),
            }
        }
        (SqlType::Int128, DbValue::Text(text)) => text
            .trim()
            .parse::<i128>()
            .map(RowValues::Int128)
            .map_err(|_| DialectError::Parameter(format!("`{text}` is not an INT128")))?,
        (SqlType::Int128, v) => match driver_integer(&v) {
            Some(i) => RowValues::Int128(i),
            None => return Err(bad_column(ty, &v)),
        },
        (SqlType::Float | SqlType::Double, DbValue::Float(f)) => RowValues::Float(f64::from(f)),
        (SqlType::Float | SqlType::Double, DbValue::Double(f)) => RowValues::Float(f),
        (SqlType::Numeric { .. }, DbValue::Scaled { value, scale }) => {
            RowValues::Decimal(Decimal::new(value, scale)?)
        }
        (SqlType::Numeric { .. }, v) => match driver_integer(&v) {
            Some(i) => RowValues::Decimal(Decimal::new(i, 0)?),
            None => return Err(bad_column(ty, &v)),
        },
        (SqlType::Boolean, DbValue::Boolean(b)) => RowValues::Bool(b),
        (SqlType::Boolean, v) => match driver_integer(&v) {
            Some(0) => RowValues::Bool(false),
            Some(1) => RowValues::Bool(true),
            _ => return Err(bad_column(ty, &v)),
        },
        (SqlType::Char { .. } | SqlType::NChar { .. }, v) => {
            let text = driver_text(ty, v)?;
            RowValues::Text(text.trim_end_matches(' ').to_string())
        }
        (
            SqlType::String { .. } | SqlType::NVarchar { .. } | SqlType::Text | SqlType::Enum { .. },
            v,
        ) => RowValues::Text(driver_text(ty, v)?),
        (SqlType::Binary, DbValue::Bytes(bytes)) => RowValues::Blob(bytes),
        (SqlType::Binary, DbValue::Text(text)) => RowValues::Blob(text.into_bytes()),
        (SqlType::Json, v) => {
            let text = driver_text(ty, v)?;
            RowValues::JSON(
                serde_json::from_str(&text)
                    .map_err(|e| DialectError::Parameter(format!("invalid JSON column: {e}")))?,
            )
        }
        (SqlType::Date, DbValue::Date(days)) => RowValues::Date(isc::decode_date(days)?),
        (SqlType::Time { .. }, DbValue::Time(units)) => RowValues::Time(isc::decode_time(units)?),
        (SqlType::Time { .. }, DbValue::TimeTz { time, zone }) => {
            let offset = isc::decode_zone(zone)?;
            let utc = isc::decode_time(time)?;
            RowValues::TimeTz {
                time: utc + chrono::Duration::seconds(i64::from(offset.local_minus_utc())),
                offset,
            }
        }
        (SqlType::Time { with_time_zone: true }, DbValue::Text(text)) => parse_time_tz(&text)?,
        (SqlType::Timestamp { .. }, DbValue::Timestamp { date, time }) => {
            RowValues::Timestamp(isc::decode_timestamp(date, time)?)
        }
        (SqlType::Timestamp { .. }, DbValue::TimestampTz { date, time, zone }) => {
            let offset = isc::decode_zone(zone)?;
            let utc = isc::decode_timestamp(date, time)?;
            RowValues::TimestampTz(offset.from_utc_datetime(&utc))
        }
        (SqlType::Timestamp { with_time_zone: true }, DbValue::Text(text)) => {
            RowValues::TimestampTz(DateTime::parse_from_rfc3339(text.trim()).map_err(|e| {
                DialectError::Parameter(format!("`{text}` is not an RFC 3339 timestamp: {e}"))
            })?)
        }
        (_, v) => return Err(bad_column(ty, &v)),
    };
    Ok(decoded)
}

fn integer(ty: &SqlType, value: &RowValues) -> Result<i128, DialectError> {
    match value {
        RowValues::Int(i) => Ok(i128::from(*i)),
        RowValues::Int128(i) => Ok(*i),
        RowValues::Decimal(d) => d
            .rescale(0)
            .map(|d| d.unscaled())
            .ok_or_else(|| DialectError::Parameter(format!("{d} is not an integer"))),
        _ => Err(mismatch(ty, value)),
    }
}

fn driver_integer(value: &DbValue) -> Option<i128> {
    match value {
        DbValue::SmallInt(v) => Some(i128::from(*v)),
        DbValue::Integer(v) => Some(i128::from(*v)),
        DbValue::BigInt(v) => Some(i128::from(*v)),
        DbValue::Int128(v) => Some(*v),
        DbValue::Scaled { value, scale: 0 } => Some(*value),
        _ => None,
    }
}

fn driver_text(ty: &SqlType, value: DbValue) -> Result<String, DialectError> {
    match value {
        DbValue::Text(text) => Ok(text),
        DbValue::Bytes(bytes) => String::from_utf8(bytes)
            .map_err(|_| DialectError::Parameter(format!("{ty:?} column is not valid UTF-8"))),
        other => Err(bad_column(ty, &other)),
    }
}

fn check_length(ty: &SqlType, text: &str) -> Result<(), DialectError> {
    if let Some(limit) = ty.char_length() {
        let count = text.chars().count();
        if count > limit as usize {
            return Err(DialectError::Parameter(format!(
                "{count} characters exceed declared length {limit}"
            )));
        }
    }
    Ok(())
}

fn parse_time_tz(text: &str) -> Result<RowValues, DialectError> {
    let invalid = || DialectError::Parameter(format!("`{text}` is not a zoned time"));
    let text = text.trim();
    if text.len() > DEGRADED_TEXT_LENGTH as usize {
        return Err(invalid());
    }
    let split = text.rfind(['+', '-']).ok_or_else(invalid)?;
    let (clock, zone) = text.split_at(split);
    let time = NaiveTime::parse_from_str(clock, "%H:%M:%S%.f").map_err(|_| invalid())?;
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let (hours, minutes) = zone[1..].split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)?;
    Ok(RowValues::TimeTz { time, offset })
}

/// Decode by the driver value's own kind, for columns reflection could not type.
pub(super) fn decode_untyped(value: DbValue) -> Result<RowValues, DialectError> {
    let decoded = match value {
        DbValue::Null => RowValues::Null,
        DbValue::SmallInt(v) => RowValues::Int(i64::from(v)),
        DbValue::Integer(v) => RowValues::Int(i64::from(v)),
        DbValue::BigInt(v) => RowValues::Int(v),
        DbValue::Int128(v) => RowValues::Int128(v),
        DbValue::Float(v) => RowValues::Float(f64::from(v)),
        DbValue::Double(v) => RowValues::Float(v),
        DbValue::Scaled { value, scale } => RowValues::Decimal(Decimal::new(value, scale)?),
        DbValue::Boolean(v) => RowValues::Bool(v),
        DbValue::Text(v) => RowValues::Text(v),
        DbValue::Bytes(v) => RowValues::Blob(v),
        DbValue::Date(days) => RowValues::Date(isc::decode_date(days)?),
        DbValue::Time(units) => RowValues::Time(isc::decode_time(units)?),
        DbValue::Timestamp { date, time } => {
            RowValues::Timestamp(isc::decode_timestamp(date, time)?)
        }
        zoned @ (DbValue::TimeTz { .. } | DbValue::TimestampTz { .. }) => {
            let ty = match zoned {
                DbValue::TimeTz { .. } => SqlType::Time {
                    with_time_zone: true,
                },
                _ => SqlType::Timestamp {
                    with_time_zone: true,
                },
            };
            return decode(&ty, zoned);
        }
    };
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::DriverKind;
    use crate::config::ServerVersion;
    use chrono::NaiveDate;

    fn caps(kind: DriverKind) -> CapabilityDescriptor {
        CapabilityDescriptor::for_driver(kind, ServerVersion::new(4, 0))
    }

    fn round_trip(caps: &CapabilityDescriptor, ty: &SqlType, value: RowValues) {
        let encoded = encode(caps, ty, &value).unwrap();
        assert_eq!(decode(ty, encoded).unwrap(), value, "{ty:?}");
    }

    #[test]
    fn int128_text_fallback_is_exact() {
        let legacy = caps(DriverKind::Legacy);
        let big = RowValues::Int128(i128::MAX);
        assert_eq!(
            encode(&legacy, &SqlType::Int128, &big).unwrap(),
            DbValue::Text("170141183460469231731687303715884105727".into())
        );
        round_trip(&legacy, &SqlType::Int128, big);
        round_trip(&legacy, &SqlType::Int128, RowValues::Int128(i128::MIN));
    }

    #[test]
    fn zoned_values_in_both_modes() {
        let offset = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        let dt = offset
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 2, 29)
                    .unwrap()
                    .and_hms_micro_opt(23, 59, 58, 123_400)
                    .unwrap(),
            )
            .unwrap();
        let ty = SqlType::Timestamp { with_time_zone: true };
        for c in [caps(DriverKind::Legacy), caps(DriverKind::Native)] {
            let decoded = decode(&ty, encode(&c, &ty, &RowValues::TimestampTz(dt)).unwrap())
                .unwrap();
            match decoded {
                RowValues::TimestampTz(back) => {
                    assert_eq!(back, dt);
                    assert_eq!(back.offset(), dt.offset());
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        let time_ty = SqlType::Time { with_time_zone: true };
        let value = RowValues::TimeTz {
            time: NaiveTime::from_hms_opt(1, 15, 0).unwrap(),
            offset: FixedOffset::west_opt(3 * 3600).unwrap(),
        };
        round_trip(&caps(DriverKind::Legacy), &time_ty, value.clone());
        round_trip(&caps(DriverKind::Native), &time_ty, value);
    }

    #[test]
    fn boolean_emulation() {
        let old = CapabilityDescriptor::for_driver(DriverKind::Legacy, ServerVersion::new(2, 5));
        assert_eq!(
            encode(&old, &SqlType::Boolean, &RowValues::Bool(true)).unwrap(),
            DbValue::SmallInt(1)
        );
        round_trip(&old, &SqlType::Boolean, RowValues::Bool(false));
    }

    #[test]
    fn rejects_out_of_domain() {
        let c = caps(DriverKind::Native);
        assert!(encode(&c, &SqlType::SmallInteger, &RowValues::Int(40_000)).is_err());
        assert!(encode(&c, &SqlType::varchar(3), &RowValues::Text("abcd".into())).is_err());
        assert!(encode(&c, &SqlType::enumeration(["a", "b"]), &RowValues::Text("c".into())).is_err());
        let inexact = RowValues::Decimal("1.234".parse().unwrap());
        assert!(encode(&c, &SqlType::numeric(10, 2), &inexact).is_err());
    }
}
