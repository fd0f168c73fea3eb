/// A value in the representation Firebird client drivers exchange with the server.
///
/// Temporal values use the ISC encoding: dates are days since 1858-11-17, times are
/// units of 1/10000 second since midnight, and zone ids for fixed offsets are
/// `1439 + offset_minutes`. Zoned values carry their date/time in UTC.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Int128(i128),
    Float(f32),
    Double(f64),
    /// `NUMERIC`/`DECIMAL` as a scaled integer.
    Scaled { value: i128, scale: u8 },
    Boolean(bool),
    Text(String),
    Bytes(Vec<u8>),
    Date(i32),
    Time(u32),
    Timestamp { date: i32, time: u32 },
    TimeTz { time: u32, zone: u16 },
    TimestampTz { date: i32, time: u32, zone: u16 },
}

impl DbValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Short name used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DbValue::Null => "NULL",
            DbValue::SmallInt(_) => "SMALLINT",
            DbValue::Integer(_) => "INTEGER",
            DbValue::BigInt(_) => "BIGINT",
            DbValue::Int128(_) => "INT128",
            DbValue::Float(_) => "FLOAT",
            DbValue::Double(_) => "DOUBLE PRECISION",
            DbValue::Scaled { .. } => "NUMERIC",
            DbValue::Boolean(_) => "BOOLEAN",
            DbValue::Text(_) => "VARCHAR",
            DbValue::Bytes(_) => "BLOB",
            DbValue::Date(_) => "DATE",
            DbValue::Time(_) => "TIME",
            DbValue::Timestamp { .. } => "TIMESTAMP",
            DbValue::TimeTz { .. } => "TIME WITH TIME ZONE",
            DbValue::TimestampTz { .. } => "TIMESTAMP WITH TIME ZONE",
        }
    }
}

/// Column metadata reported by the driver after a statement produced a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    /// Native type name as the server reports it (`VARCHAR`, `VARYING`, `INT64`, ...).
    pub type_name: String,
    pub length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    /// BLOB sub-type (1 = text).
    pub sub_type: Option<i16>,
    pub nullable: bool,
}

impl ColumnDescription {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            length: None,
            precision: None,
            scale: None,
            sub_type: None,
            nullable: true,
        }
    }

    #[must_use]
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn with_numeric(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub fn with_sub_type(mut self, sub_type: i16) -> Self {
        self.sub_type = Some(sub_type);
        self
    }
}
