use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;

mod decimal;
mod sql_type;

pub use decimal::Decimal;
pub use sql_type::SqlType;

/// Abstract values the engine binds as parameters and receives in rows.
///
/// ```rust
/// use firebird_async_dialect::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Integer value (128-bit)
    Int128(i128),
    /// Floating point value (64-bit)
    Float(f64),
    /// Fixed-precision numeric
    Decimal(Decimal),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Time of day with a fixed UTC offset
    TimeTz { time: NaiveTime, offset: FixedOffset },
    TimestampTz(DateTime<FixedOffset>),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_int128(&self) -> Option<i128> {
        match self {
            RowValues::Int128(value) => Some(*value),
            RowValues::Int(value) => Some(i128::from(*value)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        if let RowValues::Decimal(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Name of the variant, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "Int",
            RowValues::Int128(_) => "Int128",
            RowValues::Float(_) => "Float",
            RowValues::Decimal(_) => "Decimal",
            RowValues::Text(_) => "Text",
            RowValues::Bool(_) => "Bool",
            RowValues::Date(_) => "Date",
            RowValues::Time(_) => "Time",
            RowValues::Timestamp(_) => "Timestamp",
            RowValues::TimeTz { .. } => "TimeTz",
            RowValues::TimestampTz(_) => "TimestampTz",
            RowValues::Null => "Null",
            RowValues::JSON(_) => "JSON",
            RowValues::Blob(_) => "Blob",
        }
    }

    /// The abstract type a bind parameter gets when the statement does not declare one.
    #[must_use]
    pub fn inferred_type(&self) -> Option<SqlType> {
        let ty = match self {
            RowValues::Int(_) => SqlType::BigInteger,
            RowValues::Int128(_) => SqlType::Int128,
            RowValues::Float(_) => SqlType::Double,
            RowValues::Decimal(d) => SqlType::Numeric {
                precision: d.precision().max(d.scale()).max(1),
                scale: d.scale(),
            },
            RowValues::Text(s) => SqlType::varchar(u32::try_from(s.chars().count()).ok()?.max(1)),
            RowValues::Bool(_) => SqlType::Boolean,
            RowValues::Date(_) => SqlType::Date,
            RowValues::Time(_) => SqlType::Time {
                with_time_zone: false,
            },
            RowValues::Timestamp(_) => SqlType::Timestamp {
                with_time_zone: false,
            },
            RowValues::TimeTz { .. } => SqlType::Time {
                with_time_zone: true,
            },
            RowValues::TimestampTz(_) => SqlType::Timestamp {
                with_time_zone: true,
            },
            RowValues::JSON(_) => SqlType::Json,
            RowValues::Blob(_) => SqlType::Binary,
            RowValues::Null => return None,
        };
        Some(ty)
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<i128> for RowValues {
    fn from(value: i128) -> Self {
        RowValues::Int128(value)
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_owned())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<Decimal> for RowValues {
    fn from(value: Decimal) -> Self {
        RowValues::Decimal(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Named parameter values for one execution.
///
/// Positional (`?`) placeholders in text statements are addressed by their 1-based index
/// rendered as a string; [`Params::positional`] builds that mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, RowValues>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RowValues>) {
        self.values.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn positional(values: impl IntoIterator<Item = RowValues>) -> Self {
        let values = values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| ((idx + 1).to_string(), value))
            .collect();
        Self { values }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.values.get(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
