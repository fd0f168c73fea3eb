use crate::capability::CapabilityDescriptor;
use crate::error::DialectError;
use crate::types::SqlType;

/// Width of the text column that stands in for degraded `INT128` and zoned temporal types.
pub(super) const DEGRADED_TEXT_LENGTH: u32 = 40;

const MAX_PRECISION_INT64: u8 = 18;
const MAX_PRECISION_INT128: u8 = 38;

pub(super) fn render(caps: &CapabilityDescriptor, ty: &SqlType) -> Result<String, DialectError> {
    let rendered = match ty {
        SqlType::SmallInteger => "SMALLINT".to_string(),
        SqlType::Integer => "INTEGER".to_string(),
        SqlType::BigInteger => "BIGINT".to_string(),
        SqlType::Int128 => {
            if caps.int128 {
                "INT128".to_string()
            } else {
                tracing::debug!("INT128 rendered as VARCHAR({DEGRADED_TEXT_LENGTH})");
                format!("VARCHAR({DEGRADED_TEXT_LENGTH})")
            }
        }
        SqlType::Float => "FLOAT".to_string(),
        SqlType::Double => "DOUBLE PRECISION".to_string(),
        SqlType::Numeric { precision, scale } => {
            check_numeric(caps, *precision, *scale)?;
            format!("NUMERIC({precision}, {scale})")
        }
        SqlType::Boolean => {
            if caps.boolean {
                "BOOLEAN".to_string()
            } else {
                "SMALLINT".to_string()
            }
        }
        SqlType::String { length, collation } => match length {
            Some(length) => string_type("VARCHAR", Some(*length), collation.as_deref()),
            None => {
                return Err(DialectError::UnsupportedType(
                    "VARCHAR requires a length on Firebird".into(),
                ));
            }
        },
        SqlType::Char { length, collation } => string_type("CHAR", *length, collation.as_deref()),
        SqlType::NVarchar { length } => match length {
            Some(length) => string_type("NCHAR VARYING", Some(*length), None),
            None => {
                return Err(DialectError::UnsupportedType(
                    "NCHAR VARYING requires a length on Firebird".into(),
                ));
            }
        },
        SqlType::NChar { length } => string_type("NCHAR", *length, None),
        SqlType::Text | SqlType::Json => "BLOB SUB_TYPE TEXT".to_string(),
        SqlType::Binary => "BLOB SUB_TYPE BINARY".to_string(),
        SqlType::Date => "DATE".to_string(),
        SqlType::Time { with_time_zone } => zoned("TIME", caps, *with_time_zone),
        SqlType::Timestamp { with_time_zone } => zoned("TIMESTAMP", caps, *with_time_zone),
        SqlType::Enum { variants, .. } => {
            if variants.is_empty() {
                return Err(DialectError::UnsupportedType(
                    "enum without variants".into(),
                ));
            }
            let length = ty.char_length().unwrap_or(1).max(1);
            format!("VARCHAR({length})")
        }
    };
    Ok(rendered)
}

pub(super) fn check_numeric(
    caps: &CapabilityDescriptor,
    precision: u8,
    scale: u8,
) -> Result<(), DialectError> {
    if precision == 0 || scale > precision {
        return Err(DialectError::UnsupportedType(format!(
            "NUMERIC({precision}, {scale}) is not a valid declaration"
        )));
    }
    if precision > MAX_PRECISION_INT128 {
        return Err(DialectError::UnsupportedType(format!(
            "NUMERIC precision {precision} exceeds {MAX_PRECISION_INT128}"
        )));
    }
    if precision > MAX_PRECISION_INT64 && !caps.int128 {
        return Err(DialectError::UnsupportedType(format!(
            "NUMERIC precision {precision} needs INT128 support"
        )));
    }
    Ok(())
}

fn string_type(name: &str, length: Option<u32>, collation: Option<&str>) -> String {
    let mut text = name.to_string();
    if let Some(length) = length {
        text.push_str(&format!("({length})"));
    }
    if let Some(collation) = collation {
        text.push_str(" COLLATE ");
        text.push_str(collation);
    }
    text
}

fn zoned(base: &str, caps: &CapabilityDescriptor, with_time_zone: bool) -> String {
    match (with_time_zone, caps.time_zones) {
        (false, _) => base.to_string(),
        (true, true) => format!("{base} WITH TIME ZONE"),
        (true, false) => {
            tracing::debug!("{base} WITH TIME ZONE rendered as VARCHAR({DEGRADED_TEXT_LENGTH})");
            format!("VARCHAR({DEGRADED_TEXT_LENGTH})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::DriverKind;
    use crate::config::ServerVersion;

    fn caps(kind: DriverKind, major: u8) -> CapabilityDescriptor {
        CapabilityDescriptor::for_driver(kind, ServerVersion::new(major, 0))
    }

    #[test]
    fn strings_carry_length_and_collation() {
        let c = caps(DriverKind::Native, 4);
        let ty = SqlType::String {
            length: Some(50),
            collation: Some("UNICODE_CI".into()),
        };
        assert_eq!(render(&c, &ty).unwrap(), "VARCHAR(50) COLLATE UNICODE_CI");
        assert_eq!(
            render(&c, &SqlType::Char { length: None, collation: None }).unwrap(),
            "CHAR"
        );
        assert!(render(&c, &SqlType::String { length: None, collation: None }).is_err());
    }

    #[test]
    fn degraded_mappings() {
        let legacy = caps(DriverKind::Legacy, 4);
        assert_eq!(render(&legacy, &SqlType::Int128).unwrap(), "VARCHAR(40)");
        assert_eq!(
            render(&legacy, &SqlType::Timestamp { with_time_zone: true }).unwrap(),
            "VARCHAR(40)"
        );
        let old = caps(DriverKind::Native, 2);
        assert_eq!(render(&old, &SqlType::Boolean).unwrap(), "SMALLINT");
    }

    #[test]
    fn numeric_limits() {
        let legacy = caps(DriverKind::Legacy, 4);
        let native = caps(DriverKind::Native, 4);
        assert_eq!(render(&legacy, &SqlType::numeric(18, 4)).unwrap(), "NUMERIC(18, 4)");
        assert!(matches!(
            render(&legacy, &SqlType::numeric(19, 0)),
            Err(DialectError::UnsupportedType(_))
        ));
        assert_eq!(render(&native, &SqlType::numeric(38, 2)).unwrap(), "NUMERIC(38, 2)");
        assert!(render(&native, &SqlType::numeric(39, 0)).is_err());
    }
}
