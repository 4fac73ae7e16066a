//! Transposition of column-major result data while it is being deserialized.
//!
//! Result sets and fetch replies carry their cells column by column:
//!
//! ```json
//! [[c0_r0, c0_r1, c0_r2], [c1_r0, c1_r1, c1_r2]]
//! ```
//!
//! Rows are handed out one at a time, so the data is regrouped into
//! `rows[row][column]` in the same pass that parses it. Every column must hold
//! the same number of values; a ragged payload is rejected.

use serde::de::{self, DeserializeSeed, Deserializer, SeqAccess, Visitor};
use serde_json::Value;
use std::fmt;

/// Deserialize column-major data into row-major rows.
///
/// For use with `#[serde(deserialize_with = "to_row_major")]`.
pub fn to_row_major<'de, D>(deserializer: D) -> Result<Vec<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_seq(ColumnsVisitor)
}

/// Same as [`to_row_major`] for fields that may be absent or `null`.
pub fn to_row_major_option<'de, D>(deserializer: D) -> Result<Option<Vec<Vec<Value>>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_option(OptionalColumnsVisitor)
}

struct OptionalColumnsVisitor;

impl<'de> Visitor<'de> for OptionalColumnsVisitor {
    type Value = Option<Vec<Vec<Value>>>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("null or column-major data array")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        to_row_major(deserializer).map(Some)
    }
}

/// Walks the outer array, one element per column.
struct ColumnsVisitor;

impl<'de> Visitor<'de> for ColumnsVisitor {
    type Value = Vec<Vec<Value>>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("column-major data array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut column = 0;

        while seq
            .next_element_seed(ColumnSeed {
                rows: &mut rows,
                column,
            })?
            .is_some()
        {
            column += 1;
        }

        Ok(rows)
    }
}

/// Distributes one column's values across the rows built so far.
struct ColumnSeed<'a> {
    rows: &'a mut Vec<Vec<Value>>,
    column: usize,
}

impl<'de, 'a> DeserializeSeed<'de> for ColumnSeed<'a> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'a> Visitor<'de> for ColumnSeed<'a> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "array of values for column {}", self.column)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let expected = self.rows.len();
        let mut row = 0;

        while let Some(value) = seq.next_element::<Value>()? {
            if self.column == 0 {
                self.rows.push(vec![value]);
            } else if row < expected {
                self.rows[row].push(value);
            } else {
                return Err(de::Error::custom(format!(
                    "column {} has more than {} values",
                    self.column, expected
                )));
            }
            row += 1;
        }

        if self.column > 0 && row != expected {
            return Err(de::Error::invalid_length(row, &RowCount(expected)));
        }

        Ok(())
    }
}

struct RowCount(usize);

impl de::Expected for RowCount {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{} values per column", self.0)
    }
}
