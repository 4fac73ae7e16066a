//! Mapping from wire column descriptors to Exasol types.

use std::fmt;

use crate::transport::messages::DataType;

/// Largest DECIMAL precision that still fits an `i64`.
pub const MAX_INTEGER_PRECISION: u32 = 18;

/// Exasol data type representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExasolType {
    Boolean,
    Char { size: u64 },
    Varchar { size: u64 },
    Decimal { precision: u32, scale: i32 },
    Double,
    Date,
    Timestamp { with_local_time_zone: bool },
    IntervalYearToMonth { precision: u32 },
    IntervalDayToSecond { precision: u32, fraction: u32 },
    Geometry { srid: Option<u32> },
    Hashtype { size: u64 },
    /// A type name this client does not know; cells fail only when read
    Unknown(String),
}

impl ExasolType {
    /// Interpret the `dataType` object of a column description.
    pub fn from_data_type(data_type: &DataType) -> Self {
        match data_type.type_name.to_ascii_uppercase().as_str() {
            "BOOLEAN" => ExasolType::Boolean,
            "CHAR" => ExasolType::Char {
                size: data_type.size.unwrap_or(1),
            },
            "VARCHAR" => ExasolType::Varchar {
                size: data_type.size.unwrap_or(2_000_000),
            },
            "DECIMAL" => ExasolType::Decimal {
                precision: data_type.precision.unwrap_or(36),
                scale: data_type.scale.unwrap_or(0),
            },
            "DOUBLE" | "DOUBLE PRECISION" => ExasolType::Double,
            "DATE" => ExasolType::Date,
            "TIMESTAMP" => ExasolType::Timestamp {
                with_local_time_zone: data_type.with_local_time_zone.unwrap_or(false),
            },
            "TIMESTAMP WITH LOCAL TIME ZONE" => ExasolType::Timestamp {
                with_local_time_zone: true,
            },
            "INTERVAL YEAR TO MONTH" => ExasolType::IntervalYearToMonth {
                precision: data_type.precision.unwrap_or(2),
            },
            "INTERVAL DAY TO SECOND" => ExasolType::IntervalDayToSecond {
                precision: data_type.precision.unwrap_or(2),
                fraction: data_type.fraction.unwrap_or(3),
            },
            "GEOMETRY" => ExasolType::Geometry {
                srid: data_type.srid,
            },
            "HASHTYPE" => ExasolType::Hashtype {
                size: data_type.size.unwrap_or(16),
            },
            _ => ExasolType::Unknown(data_type.type_name.clone()),
        }
    }

    /// Whether DECIMAL cells of this type decode to `i64`.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ExasolType::Decimal { precision, scale: 0 } if *precision <= MAX_INTEGER_PRECISION
        )
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ExasolType::Unknown(_))
    }
}

impl fmt::Display for ExasolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExasolType::Boolean => write!(f, "BOOLEAN"),
            ExasolType::Char { size } => write!(f, "CHAR({})", size),
            ExasolType::Varchar { size } => write!(f, "VARCHAR({})", size),
            ExasolType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({},{})", precision, scale)
            }
            ExasolType::Double => write!(f, "DOUBLE"),
            ExasolType::Date => write!(f, "DATE"),
            ExasolType::Timestamp {
                with_local_time_zone: false,
            } => write!(f, "TIMESTAMP"),
            ExasolType::Timestamp {
                with_local_time_zone: true,
            } => write!(f, "TIMESTAMP WITH LOCAL TIME ZONE"),
            ExasolType::IntervalYearToMonth { precision } => {
                write!(f, "INTERVAL YEAR({}) TO MONTH", precision)
            }
            ExasolType::IntervalDayToSecond {
                precision,
                fraction,
            } => write!(f, "INTERVAL DAY({}) TO SECOND({})", precision, fraction),
            ExasolType::Geometry { srid: Some(srid) } => write!(f, "GEOMETRY({})", srid),
            ExasolType::Geometry { srid: None } => write!(f, "GEOMETRY"),
            ExasolType::Hashtype { size } => write!(f, "HASHTYPE({} BYTE)", size),
            ExasolType::Unknown(name) => write!(f, "{}", name),
        }
    }
}

impl From<&DataType> for ExasolType {
    fn from(data_type: &DataType) -> Self {
        ExasolType::from_data_type(data_type)
    }
}
