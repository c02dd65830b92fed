use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Semantic kind of the values in a result set column
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Integer,
    Decimal,
    String,
    Date,
    DateTime,
    Blob,
    Enum,
    Set,
    Geometry,
    Geographic,
    Json,
    Xml,
    Url,
    IpAddress,
}

impl ValueType {
    /// Every tag, in declaration order
    pub const ALL: [ValueType; 15] = [
        ValueType::Boolean,
        ValueType::Integer,
        ValueType::Decimal,
        ValueType::String,
        ValueType::Date,
        ValueType::DateTime,
        ValueType::Blob,
        ValueType::Enum,
        ValueType::Set,
        ValueType::Geometry,
        ValueType::Geographic,
        ValueType::Json,
        ValueType::Xml,
        ValueType::Url,
        ValueType::IpAddress,
    ];

    /// Whether values of this kind sort numerically
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Decimal)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Decimal => write!(f, "decimal"),
            ValueType::String => write!(f, "string"),
            ValueType::Date => write!(f, "date"),
            ValueType::DateTime => write!(f, "datetime"),
            ValueType::Blob => write!(f, "blob"),
            ValueType::Enum => write!(f, "enum"),
            ValueType::Set => write!(f, "set"),
            ValueType::Geometry => write!(f, "geometry"),
            ValueType::Geographic => write!(f, "geographic"),
            ValueType::Json => write!(f, "json"),
            ValueType::Xml => write!(f, "xml"),
            ValueType::Url => write!(f, "url"),
            ValueType::IpAddress => write!(f, "ipaddress"),
        }
    }
}

/// A single cell value carried by a record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Blob(Vec<u8>),
    Json(serde_json::Value),
}

impl Value {
    /// The natural value type of this value, `None` for NULL
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(ValueType::Boolean),
            Value::Integer(_) => Some(ValueType::Integer),
            Value::Decimal(_) => Some(ValueType::Decimal),
            Value::String(_) => Some(ValueType::String),
            Value::Date(_) => Some(ValueType::Date),
            Value::DateTime(_) => Some(ValueType::DateTime),
            Value::Blob(_) => Some(ValueType::Blob),
            Value::Json(_) => Some(ValueType::Json),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by aggregations
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Decimal(v) => Some(*v),
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Glyph the navigation tree shows next to a database or data source
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceListIcon {
    Database,
    Table,
    Bucket,
    Gear,
    View,
}

impl fmt::Display for SourceListIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceListIcon::Database => write!(f, "database"),
            SourceListIcon::Table => write!(f, "table"),
            SourceListIcon::Bucket => write!(f, "bucket"),
            SourceListIcon::Gear => write!(f, "gear"),
            SourceListIcon::View => write!(f, "view"),
        }
    }
}

/// Prototype for column-header sorting
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SortDescriptor {
    /// Record key to sort by
    pub key: String,
    /// Initial direction
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ascending: true,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ascending: false,
        }
    }

    /// Same key, opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            key: self.key.clone(),
            ascending: !self.ascending,
        }
    }
}

/// Backend-specific descriptive data, passed through untouched
pub type Metadata = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_display() {
        assert_eq!(ValueType::DateTime.to_string(), "datetime");
        assert_eq!(ValueType::IpAddress.to_string(), "ipaddress");
        assert_eq!(ValueType::ALL.len(), 15);
    }

    #[test]
    fn test_value_type_serde() {
        let json = serde_json::to_string(&ValueType::Geographic).unwrap();
        assert_eq!(json, "\"geographic\"");
        let parsed: ValueType = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(parsed, ValueType::Json);
    }

    #[test]
    fn test_value_natural_types() {
        assert_eq!(Value::from(3).value_type(), Some(ValueType::Integer));
        assert_eq!(Value::from("x").value_type(), Some(ValueType::String));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::Null.value_type(), None);
    }

    #[test]
    fn test_value_json_output() {
        let values = vec![Value::from(1), Value::Null, Value::from("a"), Value::from(true)];
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            "[1,null,\"a\",true]"
        );
    }

    #[test]
    fn test_sort_descriptor_reversed() {
        let sort = SortDescriptor::ascending("name");
        assert!(!sort.reversed().ascending);
        assert_eq!(sort.reversed().key, "name");
    }
}
