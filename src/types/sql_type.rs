/// Abstract column/parameter types the engine describes schemas with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    SmallInteger,
    Integer,
    BigInteger,
    /// 128-bit integer; native only on servers and drivers that support `INT128`.
    Int128,
    /// Single precision float.
    Float,
    Double,
    Numeric {
        precision: u8,
        scale: u8,
    },
    Boolean,
    /// `VARCHAR`
    String {
        length: Option<u32>,
        collation: Option<String>,
    },
    Char {
        length: Option<u32>,
        collation: Option<String>,
    },
    NVarchar {
        length: Option<u32>,
    },
    NChar {
        length: Option<u32>,
    },
    /// Unbounded text (`BLOB SUB_TYPE TEXT`).
    Text,
    /// Unbounded binary (`BLOB SUB_TYPE BINARY`).
    Binary,
    /// JSON document stored as text.
    Json,
    Date,
    Time {
        with_time_zone: bool,
    },
    Timestamp {
        with_time_zone: bool,
    },
    /// Non-native enum stored as `VARCHAR`.
    Enum {
        name: Option<String>,
        variants: Vec<String>,
    },
}

impl SqlType {
    #[must_use]
    pub fn varchar(length: u32) -> Self {
        SqlType::String {
            length: Some(length),
            collation: None,
        }
    }

    #[must_use]
    pub fn numeric(precision: u8, scale: u8) -> Self {
        SqlType::Numeric { precision, scale }
    }

    #[must_use]
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SqlType::Enum {
            name: None,
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// Declared character length for string-like types.
    #[must_use]
    pub fn char_length(&self) -> Option<u32> {
        match self {
            SqlType::String { length, .. }
            | SqlType::Char { length, .. }
            | SqlType::NVarchar { length }
            | SqlType::NChar { length } => *length,
            SqlType::Enum { variants, .. } => variants
                .iter()
                .map(|v| u32::try_from(v.chars().count()).unwrap_or(u32::MAX))
                .max(),
            _ => None,
        }
    }
}
