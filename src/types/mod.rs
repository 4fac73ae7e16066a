//! Exasol column types and cell values.

mod mapping;
mod schema;
mod value;

pub use mapping::{ExasolType, MAX_INTEGER_PRECISION};
pub use schema::{ColumnMetadata, Schema};
pub use value::{FromValue, SqlValue, ValueError, DATE_FORMAT, TIMESTAMP_FORMAT};
