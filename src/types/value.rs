//! Cell values and their coercion into Rust types.
//!
//! Result cells arrive as JSON (string, number, boolean or null). The
//! column's [`ExasolType`] decides how a cell is read: `DECIMAL(p,0)` with
//! `p <= 18` becomes an integer, other DECIMALs become [`Decimal`], DATE and
//! TIMESTAMP are parsed with chrono.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use super::mapping::ExasolType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    /// Interval in the server's text form, e.g. `+01-06` or `+2 12:30:00.000`
    Interval(String),
    /// Geometry as WKT
    Geometry(String),
    /// HASHTYPE as hex digits
    Hash(String),
}

impl SqlValue {
    /// Decode a wire cell for a column of type `ty`.
    pub fn decode(ty: &ExasolType, raw: &Value) -> Result<Self, ValueError> {
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }

        match ty {
            ExasolType::Boolean => match raw {
                Value::Bool(b) => Ok(SqlValue::Boolean(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(SqlValue::Boolean(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => {
                    Ok(SqlValue::Boolean(false))
                }
                _ => Err(ValueError::invalid("BOOLEAN", raw)),
            },
            ExasolType::Decimal { .. } if ty.is_integer() => match raw {
                Value::Number(n) => n
                    .as_i64()
                    .map(SqlValue::Integer)
                    .ok_or_else(|| ValueError::invalid("DECIMAL", raw)),
                Value::String(s) => s
                    .parse()
                    .map(SqlValue::Integer)
                    .map_err(|_| ValueError::invalid("DECIMAL", raw)),
                _ => Err(ValueError::invalid("DECIMAL", raw)),
            },
            ExasolType::Decimal { .. } => {
                let text = match raw {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.clone(),
                    _ => return Err(ValueError::invalid("DECIMAL", raw)),
                };
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map(SqlValue::Decimal)
                    .map_err(|_| ValueError::invalid("DECIMAL", raw))
            }
            ExasolType::Double => match raw {
                Value::Number(n) => n
                    .as_f64()
                    .map(SqlValue::Double)
                    .ok_or_else(|| ValueError::invalid("DOUBLE", raw)),
                Value::String(s) => s
                    .parse()
                    .map(SqlValue::Double)
                    .map_err(|_| ValueError::invalid("DOUBLE", raw)),
                _ => Err(ValueError::invalid("DOUBLE", raw)),
            },
            ExasolType::Char { .. } | ExasolType::Varchar { .. } => match raw {
                Value::String(s) => Ok(SqlValue::String(s.clone())),
                other => Ok(SqlValue::String(other.to_string())),
            },
            ExasolType::Date => {
                let text = raw.as_str().ok_or_else(|| ValueError::invalid("DATE", raw))?;
                NaiveDate::parse_from_str(text, DATE_FORMAT)
                    .map(SqlValue::Date)
                    .map_err(|_| ValueError::invalid("DATE", raw))
            }
            ExasolType::Timestamp { .. } => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| ValueError::invalid("TIMESTAMP", raw))?;
                NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                    .map(SqlValue::Timestamp)
                    .map_err(|_| ValueError::invalid("TIMESTAMP", raw))
            }
            ExasolType::IntervalYearToMonth { .. } | ExasolType::IntervalDayToSecond { .. } => raw
                .as_str()
                .map(|s| SqlValue::Interval(s.to_string()))
                .ok_or_else(|| ValueError::invalid("INTERVAL", raw)),
            ExasolType::Geometry { .. } => raw
                .as_str()
                .map(|s| SqlValue::Geometry(s.to_string()))
                .ok_or_else(|| ValueError::invalid("GEOMETRY", raw)),
            ExasolType::Hashtype { .. } => raw
                .as_str()
                .map(|s| SqlValue::Hash(s.to_string()))
                .ok_or_else(|| ValueError::invalid("HASHTYPE", raw)),
            ExasolType::Unknown(name) => Err(ValueError::UnsupportedType(name.clone())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Boolean(_) => "BOOLEAN",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::Decimal(_) => "DECIMAL",
            SqlValue::Double(_) => "DOUBLE",
            SqlValue::String(_) => "STRING",
            SqlValue::Date(_) => "DATE",
            SqlValue::Timestamp(_) => "TIMESTAMP",
            SqlValue::Interval(_) => "INTERVAL",
            SqlValue::Geometry(_) => "GEOMETRY",
            SqlValue::Hash(_) => "HASHTYPE",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Boolean(v) => write!(f, "{}", v),
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Double(v) => write!(f, "{}", v),
            SqlValue::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            SqlValue::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            SqlValue::String(v)
            | SqlValue::Interval(v)
            | SqlValue::Geometry(v)
            | SqlValue::Hash(v) => write!(f, "{}", v),
        }
    }
}

/// Why a cell could not be read as the requested type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// NULL where a non-optional type was requested
    #[error("unexpected NULL")]
    UnexpectedNull,
    /// Wire content does not match the column type
    #[error("invalid {expected} value {raw}")]
    Invalid { expected: &'static str, raw: String },
    /// Decoded value cannot become the requested Rust type
    #[error("cannot convert {actual} to {target}")]
    Mismatch { target: &'static str, actual: String },
    #[error("unsupported column type {0}")]
    UnsupportedType(String),
}

impl ValueError {
    fn invalid(expected: &'static str, raw: &Value) -> Self {
        ValueError::Invalid {
            expected,
            raw: raw.to_string(),
        }
    }

    fn mismatch(target: &'static str, value: &SqlValue) -> Self {
        ValueError::Mismatch {
            target,
            actual: value.kind().to_string(),
        }
    }
}

/// Conversion from a decoded cell into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: SqlValue) -> Result<Self, ValueError>;
}

impl FromValue for SqlValue {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Boolean(v) => Ok(v),
            SqlValue::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Integer(v) => Ok(v),
            SqlValue::Decimal(d) if d.fract().is_zero() => d.to_i64().ok_or(ValueError::Mismatch {
                target: "i64",
                actual: d.to_string(),
            }),
            SqlValue::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::mismatch("i64", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| ValueError::Mismatch {
            target: "i32",
            actual: wide.to_string(),
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Double(v) => Ok(v),
            SqlValue::Integer(v) => Ok(v as f64),
            SqlValue::Decimal(d) => d.to_f64().ok_or(ValueError::Mismatch {
                target: "f64",
                actual: d.to_string(),
            }),
            SqlValue::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::mismatch("f64", &other)),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Decimal(v) => Ok(v),
            SqlValue::Integer(v) => Ok(Decimal::from(v)),
            SqlValue::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::mismatch("Decimal", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::String(v)
            | SqlValue::Interval(v)
            | SqlValue::Geometry(v)
            | SqlValue::Hash(v) => Ok(v),
            SqlValue::Null => Err(ValueError::UnexpectedNull),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Date(v) => Ok(v),
            SqlValue::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::mismatch("NaiveDate", &other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Timestamp(v) => Ok(v),
            SqlValue::Date(d) => Ok(d.and_time(chrono::NaiveTime::MIN)),
            SqlValue::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::mismatch("NaiveDateTime", &other)),
        }
    }
}
