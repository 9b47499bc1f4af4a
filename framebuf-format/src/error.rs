use crate::DataType;

#[derive(Debug, thiserror::Error)]
/// An error that can occur while encoding or accessing an encoded table.
pub enum FormatError {
    #[error("Column not found: {0:?}")]
    /// No column with the given name exists in the table.
    NotFound(String),
    #[error("Column {column:?} has type {actual}, expected {expected}")]
    /// The column exists but its type does not support the operation.
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: DataType,
    },
    #[error("Column {column:?} has {actual} rows, expected {expected}")]
    /// Columns within a table must all have the same number of rows.
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("Column names cannot be empty")]
    /// A column was given an empty name.
    InvalidColumnName,
    #[error("Table too large to encode: {0}")]
    /// A length does not fit within the fields of the encoded layout.
    TooLarge(String),
    #[error("Encoded table corrupted: {0}")]
    /// The buffer does not contain a valid encoded table.
    ///
    /// This should never occur for buffers produced by [crate::encode]
    /// unless they were modified outside of this crate.
    Corrupted(String),
}
