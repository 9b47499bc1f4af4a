//! Column regions.
//!
//! Each column is encoded as a self contained region, its metadata followed
//! immediately by its data vector:
//!
//! ```text
//! +-----+----------+----------+-----------+------+-----+----------------+-----+
//! | tag | reserved | name_len | row_count | name | pad | data vector    | pad |
//! | u8  | [u8; 3]  | u32      | u64       |      |     |                |     |
//! +-----+----------+----------+-----------+------+-----+----------------+-----+
//! ```
//!
//! Numeric data vectors are `row_count` contiguous 8 byte little-endian values.
//! String data vectors are a `row_count + 1` entry offset table relative to the
//! start of the string heap, followed by the heap of UTF-8 bytes.
//!
//! Regions always start and end on an 8 byte boundary relative to the start of
//! the encoded table.

mod primitive;
mod string;

use std::ops::Range;

use bytes::BufMut;

pub(crate) use self::primitive::{
    map_in_place,
    read_element,
    read_prefix as read_numeric_prefix,
    Primitive,
};
pub use self::string::read_string;
use crate::raw::{align, checked_range, padding, read_array, read_u32, read_usize};
use crate::{Column, ColumnData, DataType, FormatError};

/// The size of the fixed portion of the column metadata.
const COLUMN_HEADER_SIZE: usize = 16;
/// The width of every encoded numeric value.
pub const NUMERIC_WIDTH: usize = 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
/// Describes where the data vector of a column lives within an encoded table.
///
/// A layout is computed once from the column metadata and is then used for all
/// offset arithmetic into the data vector. Construction verifies the whole data
/// vector lies within the buffer it was decoded from.
pub struct ColumnLayout {
    data_type: DataType,
    rows: usize,
    data_offset: usize,
    data_len: usize,
}

impl ColumnLayout {
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    /// The number of values in the column.
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    /// The absolute offset of the first byte of the data vector.
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    #[inline]
    /// The byte range of the whole data vector.
    pub fn data_range(&self) -> Range<usize> {
        self.data_offset..self.data_offset + self.data_len
    }

    #[inline]
    /// The width of every element, `None` for variable width columns.
    pub fn element_width(&self) -> Option<usize> {
        self.data_type.fixed_width()
    }

    /// The byte range of the element at `index` for fixed width columns.
    ///
    /// Returns `None` if the column is not fixed width or the index is
    /// out of bounds.
    pub fn element_range(&self, index: usize) -> Option<Range<usize>> {
        let width = self.element_width()?;
        if index >= self.rows {
            return None;
        }
        let start = self.data_offset + index * width;
        Some(start..start + width)
    }

    #[inline]
    /// The offset at which the next column region starts.
    pub fn region_end(&self) -> usize {
        let end = self.data_offset + self.data_len;
        end + padding(end)
    }
}

#[derive(Debug, Copy, Clone)]
/// The decoded metadata of a single column region.
pub struct ColumnMeta<'a> {
    /// The name of the column, borrowed from the encoded buffer.
    pub name: &'a str,
    /// The offset of the start of the column region.
    pub offset: usize,
    /// The location of the column's data vector.
    pub layout: ColumnLayout,
}

/// Encodes a single column region.
///
/// The returned region can be placed at any 8 byte aligned position
/// of an encoded table.
pub fn encode_column(column: &Column) -> Result<Vec<u8>, FormatError> {
    let mut buf = Vec::with_capacity(encoded_len(column));
    write_column(&mut buf, column)?;
    Ok(buf)
}

/// Returns the number of bytes [encode_column] will produce.
pub(crate) fn encoded_len(column: &Column) -> usize {
    let name = column.name.len() + padding(COLUMN_HEADER_SIZE + column.name.len());
    let data = match &column.data {
        ColumnData::Int64(values) => values.len() * NUMERIC_WIDTH,
        ColumnData::Float64(values) => values.len() * NUMERIC_WIDTH,
        ColumnData::String(values) => string::encoded_len(values),
    };
    COLUMN_HEADER_SIZE + name + data + padding(data)
}

/// Appends the column region to the buffer.
///
/// The buffer must currently end on an 8 byte boundary.
pub(crate) fn write_column(
    buf: &mut Vec<u8>,
    column: &Column,
) -> Result<(), FormatError> {
    debug_assert_eq!(padding(buf.len()), 0, "Column region must start aligned");

    if column.name.is_empty() {
        return Err(FormatError::InvalidColumnName);
    }

    let name_len = u32::try_from(column.name.len()).map_err(|_| {
        FormatError::TooLarge(format!("column name is {} bytes", column.name.len()))
    })?;

    buf.put_u8(column.data_type().tag());
    buf.put_bytes(0, 3);
    buf.put_u32_le(name_len);
    buf.put_u64_le(column.len() as u64);
    buf.put_slice(column.name.as_bytes());
    buf.put_bytes(0, padding(buf.len()));

    match &column.data {
        ColumnData::Int64(values) => {
            for value in values {
                buf.put_i64_le(*value);
            }
        },
        ColumnData::Float64(values) => {
            for value in values {
                buf.put_f64_le(*value);
            }
        },
        ColumnData::String(values) => string::write_strings(buf, values),
    }

    buf.put_bytes(0, padding(buf.len()));

    Ok(())
}

/// Decodes the metadata of the column region starting at `offset`.
///
/// Only the metadata is read, the data vector is located but never copied.
pub fn decode_column_metadata(
    buf: &[u8],
    offset: usize,
) -> Result<ColumnMeta<'_>, FormatError> {
    let [tag] = read_array::<1>(buf, offset)?;
    let data_type = DataType::from_tag(tag).ok_or_else(|| {
        FormatError::Corrupted(format!("unknown type tag {tag} for column at {offset}"))
    })?;
    let name_len = read_u32(buf, offset + 4)? as usize;
    let rows = read_usize(buf, offset + 8)?;

    let name_range = checked_range(offset + COLUMN_HEADER_SIZE, name_len, buf.len())?;
    let name = std::str::from_utf8(&buf[name_range.clone()]).map_err(|e| {
        FormatError::Corrupted(format!("column name at {offset} is not UTF-8: {e}"))
    })?;

    let data_offset = align(name_range.end).ok_or_else(|| {
        FormatError::Corrupted(format!("column at {offset} overflows"))
    })?;
    let data_len = match data_type {
        DataType::Int64 | DataType::Float64 => {
            rows.checked_mul(NUMERIC_WIDTH).ok_or_else(|| {
                FormatError::Corrupted(format!("column {name:?} has too many rows"))
            })?
        },
        DataType::String => string::data_len(buf, data_offset, rows)?,
    };
    checked_range(data_offset, data_len, buf.len())?;

    Ok(ColumnMeta {
        name,
        offset,
        layout: ColumnLayout {
            data_type,
            rows,
            data_offset,
            data_len,
        },
    })
}

/// Decodes at most the first `limit` values of the column.
pub(crate) fn decode_prefix(
    buf: &[u8],
    layout: &ColumnLayout,
    limit: usize,
) -> Result<ColumnData, FormatError> {
    let limit = limit.min(layout.rows());
    let data = match layout.data_type() {
        DataType::Int64 => ColumnData::Int64(read_numeric_prefix(buf, layout, limit)?),
        DataType::Float64 => {
            ColumnData::Float64(read_numeric_prefix(buf, layout, limit)?)
        },
        DataType::String => ColumnData::String(string::read_prefix(buf, layout, limit)?),
    };
    Ok(data)
}
