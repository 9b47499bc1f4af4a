//! The directory maps table names to the position of their encoded
//! table within the region arena.
//!
//! Entries are fixed size slots directly after the region header:
//!
//! ```text
//! +----------+----------+--------+--------+-----------+
//! | name_len | reserved | offset | length | name      |
//! | u32      | u32      | u64    | u64    | [u8; 104] |
//! +----------+----------+--------+--------+-----------+
//! ```
//!
//! Entries are only ever appended, never overwritten or removed.

use std::fmt::{Display, Formatter};
use std::ops::Range;

use serde_derive::Serialize;

use crate::header::{field, RegionHeader, HEADER_SIZE};
use crate::RegionError;

pub(crate) const ENTRY_SIZE: usize = 128;
const NAME_OFFSET: usize = 24;
/// The maximum length of a table name in bytes.
pub const MAX_TABLE_NAME_LEN: usize = ENTRY_SIZE - NAME_OFFSET;

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
/// The location of a named table within the region.
pub struct DirectoryEntry {
    /// The name of the table.
    pub name: String,
    /// The start and stop position of the encoded table in the region.
    pub position: Range<u64>,
}

impl DirectoryEntry {
    #[inline]
    /// The size of the encoded table in bytes.
    pub fn len(&self) -> u64 {
        self.position.end - self.position.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for DirectoryEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {}..{}",
            self.name, self.position.start, self.position.end
        )
    }
}

/// Returns an error if the name cannot be stored in a directory entry.
pub(crate) fn validate_table_name(name: &str) -> Result<(), RegionError> {
    if name.is_empty() || name.len() > MAX_TABLE_NAME_LEN {
        return Err(RegionError::InvalidTableName(name.to_string()));
    }
    Ok(())
}

#[inline]
fn slot(index: usize) -> Range<usize> {
    let start = HEADER_SIZE + index * ENTRY_SIZE;
    start..start + ENTRY_SIZE
}

#[derive(Debug, Clone)]
/// A published directory entry borrowed from the region.
struct RawEntry<'a> {
    name: &'a [u8],
    position: Range<u64>,
}

impl<'a> RawEntry<'a> {
    fn read(region: &'a [u8], header: &RegionHeader, index: usize) -> Result<Self, RegionError> {
        let slot = &region[slot(index)];
        let name_len = u32::from_le_bytes(field(slot, 0)) as usize;
        let start = u64::from_le_bytes(field(slot, 8));
        let len = u64::from_le_bytes(field(slot, 16));

        let end = start
            .checked_add(len)
            .filter(|end| *end <= header.free_offset && name_len <= MAX_TABLE_NAME_LEN)
            .ok_or_else(|| {
                RegionError::Corrupted(format!("directory entry {index} is out of bounds"))
            })?;

        Ok(Self {
            name: &slot[NAME_OFFSET..NAME_OFFSET + name_len],
            position: start..end,
        })
    }

    fn to_entry(&self) -> Result<DirectoryEntry, RegionError> {
        let name = std::str::from_utf8(self.name).map_err(|e| {
            RegionError::Corrupted(format!("directory entry name is not UTF-8: {e}"))
        })?;
        Ok(DirectoryEntry {
            name: name.to_string(),
            position: self.position.clone(),
        })
    }
}

/// Returns the entry for the given table name if it exists.
pub(crate) fn find(
    region: &[u8],
    header: &RegionHeader,
    name: &str,
) -> Result<Option<DirectoryEntry>, RegionError> {
    for index in 0..header.entry_count as usize {
        let entry = RawEntry::read(region, header, index)?;
        if entry.name == name.as_bytes() {
            return entry.to_entry().map(Some);
        }
    }
    Ok(None)
}

/// Returns every entry in insertion order.
pub(crate) fn list(
    region: &[u8],
    header: &RegionHeader,
) -> Result<Vec<DirectoryEntry>, RegionError> {
    (0..header.entry_count as usize)
        .map(|index| RawEntry::read(region, header, index)?.to_entry())
        .collect()
}

/// Writes the entry into the slot at `index`.
///
/// The entry only becomes visible once the header's entry count is advanced
/// past it.
pub(crate) fn write_entry(region: &mut [u8], index: usize, entry: &DirectoryEntry) {
    let slot = &mut region[slot(index)];
    slot.fill(0);
    slot[0..4].copy_from_slice(&(entry.name.len() as u32).to_le_bytes());
    slot[8..16].copy_from_slice(&entry.position.start.to_le_bytes());
    slot[16..24].copy_from_slice(&entry.len().to_le_bytes());
    slot[NAME_OFFSET..NAME_OFFSET + entry.name.len()].copy_from_slice(entry.name.as_bytes());
}
