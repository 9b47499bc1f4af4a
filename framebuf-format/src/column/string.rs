//! Access for UTF-8 string columns.
//!
//! The data vector is an offset table followed by the string heap, the
//! `i`th string occupies `heap[offsets[i]..offsets[i + 1]]`.

use bytes::BufMut;

use super::ColumnLayout;
use crate::raw::{checked_range, read_usize};
use crate::{DataType, FormatError};

const OFFSET_WIDTH: usize = 8;

pub(super) fn encoded_len(values: &[String]) -> usize {
    let heap: usize = values.iter().map(String::len).sum();
    (values.len() + 1) * OFFSET_WIDTH + heap
}

pub(super) fn write_strings(buf: &mut Vec<u8>, values: &[String]) {
    let mut end = 0u64;
    buf.put_u64_le(end);
    for value in values {
        end += value.len() as u64;
        buf.put_u64_le(end);
    }

    for value in values {
        buf.put_slice(value.as_bytes());
    }
}

/// Returns the total length of the offset table and heap.
pub(super) fn data_len(
    buf: &[u8],
    data_offset: usize,
    rows: usize,
) -> Result<usize, FormatError> {
    let table_len = rows
        .checked_add(1)
        .and_then(|n| n.checked_mul(OFFSET_WIDTH))
        .ok_or_else(|| FormatError::Corrupted(format!("{rows} rows overflows")))?;
    let table = checked_range(data_offset, table_len, buf.len())?;
    let heap_len = read_usize(buf, table.end - OFFSET_WIDTH)?;

    table_len
        .checked_add(heap_len)
        .ok_or_else(|| FormatError::Corrupted(format!("string heap of {heap_len} overflows")))
}

/// Returns the string at `index` without decoding any other strings.
pub fn read_string<'a>(
    buf: &'a [u8],
    layout: &ColumnLayout,
    index: usize,
) -> Result<&'a str, FormatError> {
    if layout.data_type() != DataType::String {
        return Err(FormatError::Corrupted(format!(
            "attempted to read {} column as string",
            layout.data_type()
        )));
    }
    if index >= layout.rows() {
        return Err(FormatError::Corrupted(format!(
            "row {index} is out of bounds of {} rows",
            layout.rows()
        )));
    }

    let table = layout.data_offset();
    let heap = table + (layout.rows() + 1) * OFFSET_WIDTH;
    let start = read_usize(buf, table + index * OFFSET_WIDTH)?;
    let end = read_usize(buf, table + (index + 1) * OFFSET_WIDTH)?;
    if start > end {
        return Err(FormatError::Corrupted(format!(
            "string {index} has inverted offsets {start}..{end}"
        )));
    }

    let heap_start = heap
        .checked_add(start)
        .ok_or_else(|| FormatError::Corrupted(format!("string {index} overflows")))?;
    let limit = layout.data_range().end.min(buf.len());
    let range = checked_range(heap_start, end - start, limit)?;
    std::str::from_utf8(&buf[range])
        .map_err(|e| FormatError::Corrupted(format!("string {index} is not UTF-8: {e}")))
}

pub(super) fn read_prefix(
    buf: &[u8],
    layout: &ColumnLayout,
    limit: usize,
) -> Result<Vec<String>, FormatError> {
    (0..limit.min(layout.rows()))
        .map(|index| read_string(buf, layout, index).map(str::to_string))
        .collect()
}
