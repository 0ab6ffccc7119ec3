//! Cell decoding
//!
//! A [`WireField`] is first checked into a [`Cell`], which guarantees that
//! exactly one variant is populated, then decoded into a [`Value`] using the
//! column's declared type.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::Column;
use crate::error::{AdminError, Result};
use crate::statement::WireField;

/// A cell with exactly one populated variant
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// SQL NULL
    Null,
    /// Text, also used for numeric, date and time types
    String(String),
    /// 64-bit integer
    Long(i64),
    /// Double precision float
    Double(f64),
    /// Boolean
    Boolean(bool),
    /// Base64 payload
    Blob(String),
}

impl TryFrom<WireField> for Cell {
    type Error = AdminError;

    fn try_from(field: WireField) -> Result<Self> {
        // The null marker wins over anything else the service filled in
        if field.is_null == Some(true) {
            return Ok(Cell::Null);
        }

        let mut populated = Vec::with_capacity(1);
        if let Some(v) = field.boolean_value {
            populated.push(Cell::Boolean(v));
        }
        if let Some(v) = field.long_value {
            populated.push(Cell::Long(v));
        }
        if let Some(v) = field.double_value {
            populated.push(Cell::Double(v));
        }
        if let Some(v) = field.string_value {
            populated.push(Cell::String(v));
        }
        if let Some(v) = field.blob_value {
            populated.push(Cell::Blob(v));
        }

        match populated.len() {
            1 => Ok(populated.remove(0)),
            0 => Err(AdminError::materialization("cell has no populated value")),
            n => Err(AdminError::materialization(format!(
                "cell has {} populated values, expected one",
                n
            ))),
        }
    }
}

impl Cell {
    /// Decode into a typed value for `column`
    ///
    /// Text in a numeric or decimal column is parsed as an exact decimal;
    /// text that does not parse is an error rather than a silent string.
    pub fn decode(self, column: &Column) -> Result<Value> {
        match self {
            Cell::Null => Ok(Value::Null),
            Cell::Boolean(v) => Ok(Value::Boolean(v)),
            Cell::Long(v) => Ok(Value::Integer(v)),
            Cell::Double(v) => Ok(Value::Float(v)),
            Cell::Blob(v) => Ok(Value::String(v)),
            Cell::String(s) if column.is_decimal() => {
                parse_decimal(&s).map(Value::Decimal).ok_or_else(|| {
                    AdminError::materialization(format!(
                        "column '{}' ({}) holds non-numeric text '{}'",
                        column.name,
                        column.type_name.as_deref().unwrap_or("numeric"),
                        s
                    ))
                })
            },
            Cell::String(s) => Ok(Value::String(s)),
        }
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// A decoded cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean
    Boolean(bool),
    /// 64-bit integer
    Integer(i64),
    /// Double precision float
    Float(f64),
    /// Exact decimal from a numeric column
    Decimal(Decimal),
    /// Text
    String(String),
}

impl Value {
    /// Whether this is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view; decimals without fraction convert
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }

    /// Floating point view of any numeric value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Text view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            // Keep full precision for JSON consumers
            Value::Decimal(v) => serializer.serialize_str(&v.to_string()),
            Value::String(v) => serializer.serialize_str(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(type_name: &str) -> Column {
        Column {
            name: "amount".to_string(),
            index: 0,
            type_name: Some(type_name.to_string()),
        }
    }

    #[test]
    fn test_single_variant_cells() {
        assert_eq!(Cell::try_from(WireField::long(7)).unwrap(), Cell::Long(7));
        assert_eq!(
            Cell::try_from(WireField::string("x")).unwrap(),
            Cell::String("x".into())
        );
        assert_eq!(Cell::try_from(WireField::null()).unwrap(), Cell::Null);
    }

    #[test]
    fn test_null_marker_wins() {
        let field = WireField {
            is_null: Some(true),
            long_value: Some(3),
            ..Default::default()
        };
        assert_eq!(Cell::try_from(field).unwrap(), Cell::Null);
    }

    #[test]
    fn test_empty_cell_rejected() {
        let err = Cell::try_from(WireField::default()).unwrap_err();
        assert!(matches!(err, AdminError::Materialization(_)));

        let explicit_not_null = WireField {
            is_null: Some(false),
            ..Default::default()
        };
        assert!(Cell::try_from(explicit_not_null).is_err());
    }

    #[test]
    fn test_ambiguous_cell_rejected() {
        let field = WireField {
            long_value: Some(1),
            string_value: Some("1".into()),
            ..Default::default()
        };
        let err = Cell::try_from(field).unwrap_err();
        assert!(err.to_string().contains("2 populated values"));
    }

    #[test]
    fn test_numeric_text_decodes_to_decimal() {
        let value = Cell::String("1234.50".into())
            .decode(&column("numeric"))
            .unwrap();
        assert_eq!(value, Value::Decimal(Decimal::from_str("1234.50").unwrap()));
        assert_eq!(serde_json::to_value(&value).unwrap(), "1234.50");
    }

    #[test]
    fn test_non_numeric_text_in_numeric_column_is_error() {
        let err = Cell::String("n/a".into())
            .decode(&column("numeric(10,2)"))
            .unwrap_err();
        assert!(matches!(err, AdminError::Materialization(_)));
    }

    #[test]
    fn test_text_column_keeps_text() {
        let value = Cell::String("2024-05-01 10:00:00".into())
            .decode(&column("timestamp"))
            .unwrap();
        assert_eq!(value.as_str(), Some("2024-05-01 10:00:00"));
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Integer(4).as_f64(), Some(4.0));
        assert_eq!(Value::Decimal(Decimal::new(1200, 2)).as_i64(), Some(12));
        assert_eq!(Value::Decimal(Decimal::new(1250, 2)).as_i64(), None);
        assert_eq!(Value::String("4".into()).as_f64(), None);
        assert!(Value::Null.is_null());
    }
}
