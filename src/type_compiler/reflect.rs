use crate::driver::ColumnDescription;
use crate::types::SqlType;

/// BLOB sub-type for text.
const BLOB_SUB_TYPE_TEXT: i16 = 1;

pub(super) fn sql_type_for(column: &ColumnDescription) -> Option<SqlType> {
    let name = column.type_name.trim().to_ascii_uppercase();

    // Scaled integer columns report their storage type with a non-zero scale.
    if let (Some(precision), Some(scale)) = (column.precision, column.scale) {
        if scale > 0 || matches!(name.as_str(), "NUMERIC" | "DECIMAL") {
            return Some(SqlType::numeric(precision.max(1), scale));
        }
    }

    let ty = match name.as_str() {
        "SMALLINT" | "SHORT" => SqlType::SmallInteger,
        "INTEGER" | "INT" | "LONG" => SqlType::Integer,
        "BIGINT" | "INT64" => SqlType::BigInteger,
        "INT128" => SqlType::Int128,
        "FLOAT" => SqlType::Float,
        "DOUBLE" | "DOUBLE PRECISION" | "D_FLOAT" => SqlType::Double,
        "NUMERIC" | "DECIMAL" => SqlType::numeric(18, 0),
        "BOOLEAN" => SqlType::Boolean,
        "VARCHAR" | "VARYING" | "CSTRING" => SqlType::String {
            length: column.length,
            collation: None,
        },
        "CHAR" | "TEXT" => SqlType::Char {
            length: column.length,
            collation: None,
        },
        "BLOB" | "BLOB SUB_TYPE TEXT" | "BLOB SUB_TYPE BINARY" => {
            if column.sub_type == Some(BLOB_SUB_TYPE_TEXT) || name.ends_with("TEXT") {
                SqlType::Text
            } else {
                SqlType::Binary
            }
        }
        "DATE" => SqlType::Date,
        "TIME" => SqlType::Time {
            with_time_zone: false,
        },
        "TIMESTAMP" => SqlType::Timestamp {
            with_time_zone: false,
        },
        "TIME WITH TIME ZONE" => SqlType::Time {
            with_time_zone: true,
        },
        "TIMESTAMP WITH TIME ZONE" => SqlType::Timestamp {
            with_time_zone: true,
        },
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_string_names() {
        for name in ["VARYING", "cstring", "VARCHAR"] {
            let col = ColumnDescription::new("c", name).with_length(20);
            assert_eq!(sql_type_for(&col), Some(SqlType::varchar(20)));
        }
        let text = ColumnDescription::new("c", "TEXT").with_length(4);
        assert!(matches!(sql_type_for(&text), Some(SqlType::Char { length: Some(4), .. })));
    }

    #[test]
    fn scaled_bigint_is_numeric() {
        let col = ColumnDescription::new("price", "INT64").with_numeric(18, 2);
        assert_eq!(sql_type_for(&col), Some(SqlType::numeric(18, 2)));
        let blob = ColumnDescription::new("body", "BLOB").with_sub_type(1);
        assert_eq!(sql_type_for(&blob), Some(SqlType::Text));
        assert_eq!(sql_type_for(&ColumnDescription::new("x", "ARRAY")), None);
    }
}
