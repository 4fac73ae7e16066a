//! Column metadata of a result set.

use crate::error::ConversionError;
use crate::transport::messages::ColumnInfo;
use crate::types::ExasolType;

/// Column metadata from Exasol result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: ExasolType,
}

impl From<&ColumnInfo> for ColumnMetadata {
    fn from(column: &ColumnInfo) -> Self {
        Self {
            name: column.name.clone(),
            data_type: ExasolType::from_data_type(&column.data_type),
        }
    }
}

/// Ordered columns of a result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<ColumnMetadata>,
}

impl Schema {
    pub fn from_columns(columns: &[ColumnInfo]) -> Self {
        Self {
            columns: columns.iter().map(ColumnMetadata::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Result<&ColumnMetadata, ConversionError> {
        self.columns
            .get(index)
            .ok_or(ConversionError::ColumnIndexOutOfBounds {
                index,
                count: self.columns.len(),
            })
    }

    /// Position of a column by name.
    ///
    /// Exact matches win; otherwise the first case-insensitive match is used,
    /// since unquoted identifiers come back upper-cased.
    pub fn index_of(&self, name: &str) -> Result<usize, ConversionError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| ConversionError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
