//! Bounded reads of the leading rows of an encoded table.

use tracing::trace;

use crate::column::decode_prefix;
use crate::{Column, FormatError, Table, TableHeader};

/// The number of rows returned by a head read when no limit is given.
pub const DEFAULT_HEAD_ROWS: usize = 5;

/// Decodes at most the first `rows` rows of every column.
///
/// Only the leading values of each column are read, the cost is proportional
/// to the number of columns multiplied by `min(rows, row_count)` rather than
/// the size of the table. Column names and order match the encoded table.
pub fn decode_head(buf: &[u8], rows: usize) -> Result<Table, FormatError> {
    let header = TableHeader::decode(buf)?;

    let mut columns = Vec::with_capacity(header.column_count());
    for meta in header.columns() {
        let meta = meta?;
        let data = decode_prefix(buf, &meta.layout, rows)?;
        columns.push(Column::new(meta.name, data));
    }

    trace!(columns = columns.len(), rows, "Decoded table head");

    Table::new(columns)
}

/// Decodes the entire table.
pub fn decode_table(buf: &[u8]) -> Result<Table, FormatError> {
    decode_head(buf, usize::MAX)
}
