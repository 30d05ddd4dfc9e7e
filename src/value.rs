//! Typed values and schema-driven casting.
//!
//! `Value` is the closed set of things a resolved cell can be. Amount
//! and quantity columns use arbitrary-precision decimals, never floats,
//! so monetary data survives the round trip without rounding drift.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rust_decimal::{Decimal, prelude::FromPrimitive};

use crate::catalog::ColumnKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => (if *b { "Y" } else { "N" }).to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Integer(i) => ToSqlOutput::from(*i),
            // Bound as canonical text to keep exact precision.
            Value::Decimal(d) => ToSqlOutput::from(d.to_string()),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Boolean(b) => ToSqlOutput::from(if *b { "Y" } else { "N" }),
            Value::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                ToSqlOutput::from(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
        })
    }
}

/// Convert a lookup result by its storage class.
pub fn from_sql_ref(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(Value::Integer(i)),
        ValueRef::Real(f) => Decimal::from_f64(f).map(Value::Decimal),
        ValueRef::Text(bytes) => Some(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(bytes) => Some(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
    }
}

/// Why a cast failed; the resolver wraps this with row/column/token
/// coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastFailure {
    pub reason: String,
}

impl CastFailure {
    fn new(reason: impl Into<String>) -> Self {
        CastFailure {
            reason: reason.into(),
        }
    }
}

/// Cast a raw cell to the destination column's declared kind. The
/// caller has already handled null tokens and lookups.
pub fn cast_value(
    raw: &str,
    kind: ColumnKind,
    max_length: Option<usize>,
) -> Result<Value, CastFailure> {
    match kind {
        ColumnKind::Text => {
            if let Some(max) = max_length {
                if raw.chars().count() > max {
                    return Err(CastFailure::new(format!(
                        "value is {} character(s), exceeds maximum length {max}",
                        raw.chars().count()
                    )));
                }
            }
            Ok(Value::Text(raw.to_string()))
        }
        ColumnKind::Integer => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| CastFailure::new("not a valid integer")),
        ColumnKind::Decimal => raw
            .parse::<Decimal>()
            .map(Value::Decimal)
            .map_err(|_| CastFailure::new("not a valid decimal number")),
        ColumnKind::Boolean => match raw.to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" | "t" | "1" => Ok(Value::Boolean(true)),
            "n" | "no" | "false" | "f" | "0" => Ok(Value::Boolean(false)),
            _ => Err(CastFailure::new("not a recognized yes/no value")),
        },
        // Fixed-length heuristic: 10 characters is a date-only value,
        // anything else is a date-time.
        ColumnKind::Temporal => {
            if raw.chars().count() == 10 {
                parse_naive_date(raw).map(Value::Date)
            } else {
                parse_naive_datetime(raw).map(Value::DateTime)
            }
        }
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate, CastFailure> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(CastFailure::new(format!("'{value}' is not a valid date")))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime, CastFailure> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(CastFailure::new(format!(
        "'{value}' is not a valid date-time"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_integer_and_decimal() {
        assert_eq!(
            cast_value("42", ColumnKind::Integer, None).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            cast_value("19.99", ColumnKind::Decimal, None).unwrap(),
            Value::Decimal("19.99".parse().unwrap())
        );
        assert!(cast_value("abc", ColumnKind::Integer, None).is_err());
        assert!(cast_value("1.2.3", ColumnKind::Decimal, None).is_err());
    }

    #[test]
    fn boolean_spellings() {
        for truthy in ["Y", "yes", "TRUE", "t", "1"] {
            assert_eq!(
                cast_value(truthy, ColumnKind::Boolean, None).unwrap(),
                Value::Boolean(true),
                "spelling {truthy}"
            );
        }
        for falsy in ["n", "No", "false", "F", "0"] {
            assert_eq!(
                cast_value(falsy, ColumnKind::Boolean, None).unwrap(),
                Value::Boolean(false),
                "spelling {falsy}"
            );
        }
        assert!(cast_value("maybe", ColumnKind::Boolean, None).is_err());
    }

    #[test]
    fn text_length_is_enforced() {
        assert!(cast_value("short", ColumnKind::Text, Some(10)).is_ok());
        let err = cast_value("much too long", ColumnKind::Text, Some(5)).unwrap_err();
        assert!(err.reason.contains("maximum length 5"));
        assert!(cast_value("unbounded text", ColumnKind::Text, None).is_ok());
    }

    #[test]
    fn temporal_length_heuristic() {
        assert_eq!(
            cast_value("2024-05-06", ColumnKind::Temporal, None).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap())
        );
        let dt = cast_value("2024-05-06 14:30:00", ColumnKind::Temporal, None).unwrap();
        assert!(matches!(dt, Value::DateTime(_)));
        assert!(cast_value("yesterday!", ColumnKind::Temporal, None).is_err());
    }

    #[test]
    fn boolean_binds_as_yes_no() {
        assert_eq!(Value::Boolean(true).as_display(), "Y");
        assert_eq!(Value::Boolean(false).as_display(), "N");
    }
}
