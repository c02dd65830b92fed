//! Mapping between SQLite storage classes, declared column types and
//! Induction values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use induction_adapter::{DataError, Value, ValueType};
use rusqlite::types::ValueRef;
use rusqlite::ErrorCode;

/// Map a declared column type to a ValueType using SQLite's affinity rules,
/// refined for the date, boolean and JSON spellings SQLite itself ignores
pub fn map_decltype(declared: &str) -> Option<ValueType> {
    let declared = declared.trim().to_ascii_uppercase();
    if declared.is_empty() {
        return None;
    }

    let value_type = if declared.contains("JSON") {
        ValueType::Json
    } else if declared.contains("DATETIME") || declared.contains("TIMESTAMP") {
        ValueType::DateTime
    } else if declared.contains("DATE") {
        ValueType::Date
    } else if declared.contains("BOOL") {
        ValueType::Boolean
    } else if declared.contains("INT") {
        ValueType::Integer
    } else if declared.contains("XML") {
        ValueType::Xml
    } else if declared.contains("CHAR") || declared.contains("CLOB") || declared.contains("TEXT") {
        ValueType::String
    } else if declared.contains("BLOB") {
        ValueType::Blob
    } else if declared.contains("REAL")
        || declared.contains("FLOA")
        || declared.contains("DOUB")
        || declared.contains("NUMERIC")
        || declared.contains("DECIMAL")
    {
        ValueType::Decimal
    } else {
        return None;
    };
    Some(value_type)
}

/// Convert one cell, using the declared type to recover values SQLite
/// stores as text or integers
pub fn to_value(cell: ValueRef<'_>, declared: Option<ValueType>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => match declared {
            Some(ValueType::Boolean) => Value::Boolean(v != 0),
            _ => Value::Integer(v),
        },
        ValueRef::Real(v) => Value::Decimal(v),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            match declared {
                Some(ValueType::Date) => parse_date(&text)
                    .map(Value::Date)
                    .unwrap_or_else(|| Value::String(text.into_owned())),
                Some(ValueType::DateTime) => parse_datetime(&text)
                    .map(Value::DateTime)
                    .unwrap_or_else(|| Value::String(text.into_owned())),
                Some(ValueType::Json) => serde_json::from_str(&text)
                    .map(Value::Json)
                    .unwrap_or_else(|_| Value::String(text.into_owned())),
                _ => Value::String(text.into_owned()),
            }
        }
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// Bind parameter for a constant inside a translated expression
pub fn to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Boolean(v) => Sql::Integer(i64::from(*v)),
        Value::Integer(v) => Sql::Integer(*v),
        Value::Decimal(v) => Sql::Real(*v),
        Value::String(v) => Sql::Text(v.clone()),
        Value::Date(v) => Sql::Text(v.format("%Y-%m-%d").to_string()),
        Value::DateTime(v) => Sql::Text(v.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::Blob(v) => Sql::Blob(v.clone()),
        Value::Json(v) => Sql::Text(v.to_string()),
    }
}

/// Failure while running a statement or lifecycle step
pub fn map_error(err: rusqlite::Error) -> DataError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::CannotOpen => DataError::ConnectionFailed(err.to_string()),
            ErrorCode::NotADatabase => DataError::ProtocolMismatch(err.to_string()),
            ErrorCode::PermissionDenied | ErrorCode::AuthorizationForStatementDenied => {
                DataError::AuthenticationRejected(err.to_string())
            }
            ErrorCode::OperationInterrupted => DataError::Cancelled,
            _ => DataError::ExecutionFailed(err.to_string()),
        },
        rusqlite::Error::InvalidPath(path) => {
            DataError::InvalidUrl(format!("invalid database path {}", path.display()))
        }
        _ => DataError::ExecutionFailed(err.to_string()),
    }
}

/// Failure while preparing user-supplied SQL
pub fn map_prepare_error(err: rusqlite::Error) -> DataError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::Unknown => {
            DataError::QuerySyntax(err.to_string())
        }
        _ => map_error(err),
    }
}

/// Double-quoted identifier with embedded quotes doubled
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_decltype() {
        assert_eq!(map_decltype("INTEGER"), Some(ValueType::Integer));
        assert_eq!(map_decltype("bigint"), Some(ValueType::Integer));
        assert_eq!(map_decltype("VARCHAR(255)"), Some(ValueType::String));
        assert_eq!(map_decltype("double precision"), Some(ValueType::Decimal));
        assert_eq!(map_decltype("DATETIME"), Some(ValueType::DateTime));
        assert_eq!(map_decltype("date"), Some(ValueType::Date));
        assert_eq!(map_decltype("BOOLEAN"), Some(ValueType::Boolean));
        assert_eq!(map_decltype("json"), Some(ValueType::Json));
        assert_eq!(map_decltype("BLOB"), Some(ValueType::Blob));
        assert_eq!(map_decltype(""), None);
        assert_eq!(map_decltype("whatever"), None);
    }

    #[test]
    fn test_to_value_uses_declared_type() {
        assert_eq!(
            to_value(ValueRef::Integer(1), Some(ValueType::Boolean)),
            Value::Boolean(true)
        );
        assert_eq!(to_value(ValueRef::Integer(1), None), Value::Integer(1));
        assert_eq!(
            to_value(ValueRef::Text(b"2024-02-29"), Some(ValueType::Date)),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(
            to_value(ValueRef::Text(b"not a date"), Some(ValueType::Date)),
            Value::String("not a date".into())
        );
        assert_eq!(
            to_value(ValueRef::Text(br#"{"a":1}"#), Some(ValueType::Json)),
            Value::Json(serde_json::json!({ "a": 1 }))
        );
        assert!(matches!(
            to_value(ValueRef::Text(b"2024-01-02 03:04:05"), Some(ValueType::DateTime)),
            Value::DateTime(_)
        ));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
