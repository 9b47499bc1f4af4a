//! The in-memory, row count aligned representation of a table.
//!
//! A [Table] only lives long enough to be encoded, or is the materialized
//! result of reading back part of an encoded table.

use serde_derive::{Deserialize, Serialize};

use crate::{DataType, FormatError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The typed values held by a single column.
pub enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    String(Vec<String>),
}

impl ColumnData {
    #[inline]
    /// Returns the [DataType] of the values.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::String(_) => DataType::String,
        }
    }

    #[inline]
    /// The number of values in the column.
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(values) => values.len(),
            Self::Float64(values) => values.len(),
            Self::String(values) => values.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<i64>> for ColumnData {
    fn from(values: Vec<i64>) -> Self {
        Self::Int64(values)
    }
}

impl From<Vec<f64>> for ColumnData {
    fn from(values: Vec<f64>) -> Self {
        Self::Float64(values)
    }
}

impl From<Vec<String>> for ColumnData {
    fn from(values: Vec<String>) -> Self {
        Self::String(values)
    }
}

impl From<Vec<&str>> for ColumnData {
    fn from(values: Vec<&str>) -> Self {
        Self::String(values.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A named column of values.
pub struct Column {
    /// The name of the column.
    ///
    /// Names are not required to be unique, lookups by name always
    /// resolve to the first matching column.
    pub name: String,
    /// The values within the column.
    pub data: ColumnData,
}

impl Column {
    /// Creates a new column with the given name and values.
    pub fn new(name: impl Into<String>, data: impl Into<ColumnData>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedTable")]
/// An ordered set of columns which all share the same row count.
///
/// The order of the columns is significant, it is the order in which
/// they are encoded and the order in which they are read back.
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Creates a new table from the given columns.
    ///
    /// Returns [FormatError::LengthMismatch] if the columns do not all
    /// have the same number of rows.
    pub fn new(columns: Vec<Column>) -> Result<Self, FormatError> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(column) = columns.iter().find(|c| c.len() != expected) {
                return Err(FormatError::LengthMismatch {
                    column: column.name.clone(),
                    expected,
                    actual: column.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    /// Creates a table with no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    /// The columns of the table, in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the first column with the given name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    /// The number of rows in the table, `0` if there are no columns.
    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}

#[derive(Deserialize)]
struct UncheckedTable {
    columns: Vec<Column>,
}

impl TryFrom<UncheckedTable> for Table {
    type Error = FormatError;

    fn try_from(value: UncheckedTable) -> Result<Self, Self::Error> {
        Self::new(value.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_row_count() {
        let table = Table::new(vec![
            Column::new("a", vec![1i64, 2, 3]),
            Column::new("b", vec!["x", "y", "z"]),
        ])
        .unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 2);
        assert_eq!(Table::empty().row_count(), 0);
    }

    #[test]
    fn test_table_rejects_uneven_columns() {
        let err = Table::new(vec![
            Column::new("a", vec![1i64, 2, 3]),
            Column::new("b", vec![1.0f64]),
        ])
        .expect_err("Columns should be rejected");
        assert!(
            matches!(err, FormatError::LengthMismatch { ref column, expected: 3, actual: 1 } if column == "b"),
            "Unexpected error: {err:?}",
        );
    }

    #[test]
    fn test_column_lookup_is_first_match() {
        let table = Table::new(vec![
            Column::new("a", vec![1i64]),
            Column::new("a", vec![2i64]),
        ])
        .unwrap();
        let column = table.column("a").unwrap();
        assert_eq!(column.data, ColumnData::Int64(vec![1]));
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_table_json_shape() {
        let json = serde_json::json!({
            "columns": [
                {"name": "id", "data": {"int64": [1, 2]}},
                {"name": "score", "data": {"float64": [0.5, 1.5]}},
                {"name": "label", "data": {"string": ["a", "b"]}},
            ]
        });
        let table: Table = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[2].data_type(), DataType::String);
        assert_eq!(serde_json::to_value(&table).unwrap(), json);
    }

    #[test]
    fn test_table_json_validates_lengths() {
        let json = serde_json::json!({
            "columns": [
                {"name": "id", "data": {"int64": [1, 2]}},
                {"name": "score", "data": {"float64": [0.5]}},
            ]
        });
        let result = serde_json::from_value::<Table>(json);
        assert!(result.is_err());
    }
}
