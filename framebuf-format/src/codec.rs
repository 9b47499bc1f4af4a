//! The table codec.
//!
//! An encoded table is a fixed header and a column directory, followed by the
//! column regions in table order:
//!
//! ```text
//! +-------+---------+----------+--------------+----------+-------------------+-----+
//! | magic | version | reserved | column_count | reserved | directory         | ... |
//! | FBUF  | u16     | u16      | u32          | u32      | count x u64 offset|     |
//! +-------+---------+----------+--------------+----------+-------------------+-----+
//! ... | col 1 metadata | val 1 | val 2 | ... | col 2 metadata | val 1 | val 2 | ...
//! ```
//!
//! The directory allows column `i` to be located without scanning the data of
//! any previous column.

use bytes::BufMut;
use tracing::trace;

use crate::column::{self, decode_column_metadata, ColumnMeta};
use crate::raw::{checked_range, read_array, read_u32, read_usize};
use crate::{FormatError, Table};

/// The magic bytes every encoded table starts with.
pub const MAGIC: [u8; 4] = *b"FBUF";
/// The version of the encoding written by this crate.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_SIZE: usize = 16;
const DIRECTORY_ENTRY_SIZE: usize = 8;

/// Encodes the table into a single self-describing buffer.
///
/// The encoded length is always a multiple of 8 bytes.
pub fn encode(table: &Table) -> Result<Vec<u8>, FormatError> {
    let column_count = u32::try_from(table.column_count()).map_err(|_| {
        FormatError::TooLarge(format!("{} columns", table.column_count()))
    })?;

    let directory_len = table.column_count() * DIRECTORY_ENTRY_SIZE;
    let total_len = HEADER_SIZE
        + directory_len
        + table.columns().iter().map(column::encoded_len).sum::<usize>();

    let mut buf = Vec::with_capacity(total_len);
    buf.put_slice(&MAGIC);
    buf.put_u16_le(FORMAT_VERSION);
    buf.put_u16_le(0);
    buf.put_u32_le(column_count);
    buf.put_u32_le(0);
    buf.put_bytes(0, directory_len);

    for (index, column) in table.columns().iter().enumerate() {
        let offset = buf.len() as u64;
        let slot = HEADER_SIZE + index * DIRECTORY_ENTRY_SIZE;
        buf[slot..slot + DIRECTORY_ENTRY_SIZE].copy_from_slice(&offset.to_le_bytes());
        column::write_column(&mut buf, column)?;
    }

    debug_assert_eq!(buf.len(), total_len);
    trace!(
        columns = table.column_count(),
        rows = table.row_count(),
        num_bytes = buf.len(),
        "Encoded table"
    );

    Ok(buf)
}

#[derive(Debug, Copy, Clone)]
/// A view over the header and column directory of an encoded table.
///
/// Decoding the header is `O(1)`, columns are resolved lazily from
/// the directory and no data vectors are ever touched.
pub struct TableHeader<'a> {
    buf: &'a [u8],
    column_count: usize,
}

impl<'a> TableHeader<'a> {
    /// Decodes the header of an encoded table.
    pub fn decode(buf: &'a [u8]) -> Result<Self, FormatError> {
        let magic = read_array::<4>(buf, 0)?;
        if magic != MAGIC {
            return Err(FormatError::Corrupted(format!(
                "invalid magic bytes {magic:?}"
            )));
        }

        let version = u16::from_le_bytes(read_array::<2>(buf, 4)?);
        if version != FORMAT_VERSION {
            return Err(FormatError::Corrupted(format!(
                "unsupported format version {version}"
            )));
        }

        let column_count = read_u32(buf, 8)? as usize;
        checked_range(HEADER_SIZE, column_count * DIRECTORY_ENTRY_SIZE, buf.len())?;

        Ok(Self { buf, column_count })
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Returns the offset of the column region at `index`.
    pub fn column_offset(&self, index: usize) -> Result<usize, FormatError> {
        if index >= self.column_count {
            return Err(FormatError::Corrupted(format!(
                "column {index} is out of bounds of {} columns",
                self.column_count
            )));
        }
        read_usize(self.buf, HEADER_SIZE + index * DIRECTORY_ENTRY_SIZE)
    }

    /// Decodes the metadata of the column at `index`.
    pub fn column(&self, index: usize) -> Result<ColumnMeta<'a>, FormatError> {
        let offset = self.column_offset(index)?;
        decode_column_metadata(self.buf, offset)
    }

    /// Iterates over the metadata of every column, in table order.
    pub fn columns(
        &self,
    ) -> impl Iterator<Item = Result<ColumnMeta<'a>, FormatError>> + 'a {
        let slf = *self;
        (0..self.column_count).map(move |index| slf.column(index))
    }

    /// Returns the first column with the given name.
    ///
    /// This does not allocate.
    pub fn find(&self, name: &str) -> Result<Option<ColumnMeta<'a>>, FormatError> {
        for column in self.columns() {
            let column = column?;
            if column.name == name {
                return Ok(Some(column));
            }
        }
        Ok(None)
    }

    /// Decodes the metadata of every column, in table order.
    pub fn locators(&self) -> Result<Vec<ColumnMeta<'a>>, FormatError> {
        self.columns().collect()
    }
}

/// Decodes the header and column directory of an encoded table.
pub fn decode_table_header(buf: &[u8]) -> Result<TableHeader<'_>, FormatError> {
    TableHeader::decode(buf)
}

/// Returns the metadata of the first column called `name` if it exists.
pub fn find_column<'a>(
    buf: &'a [u8],
    name: &str,
) -> Result<Option<ColumnMeta<'a>>, FormatError> {
    TableHeader::decode(buf)?.find(name)
}
