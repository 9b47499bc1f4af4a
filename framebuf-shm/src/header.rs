//! The fixed header at the start of every shared region.
//!
//! ```text
//! +---------+---------+----------------+----------+-------------+-------------+----------+
//! | magic   | version | entry_capacity | capacity | entry_count | free_offset | reserved |
//! | [u8; 8] | u32     | u32            | u64      | u64         | u64         | [u8; 24] |
//! +---------+---------+----------------+----------+-------------+-------------+----------+
//! ```

use crate::directory::ENTRY_SIZE;
use crate::RegionError;

pub(crate) const MAGIC: [u8; 8] = *b"FBUFSHM\0";
pub(crate) const REGION_VERSION: u32 = 1;
pub(crate) const HEADER_SIZE: usize = 64;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct RegionHeader {
    /// The maximum number of tables the directory can hold.
    pub entry_capacity: u32,
    /// The total size of the region in bytes.
    pub capacity: u64,
    /// The number of published directory entries.
    pub entry_count: u64,
    /// The offset of the next free byte in the arena.
    pub free_offset: u64,
}

impl RegionHeader {
    /// Creates the header of a new, empty region.
    pub(crate) fn new(capacity: u64, entry_capacity: u32) -> Self {
        Self {
            entry_capacity,
            capacity,
            entry_count: 0,
            free_offset: arena_start(entry_capacity) as u64,
        }
    }

    /// Reads and validates the header at the start of the region.
    pub(crate) fn read(region: &[u8]) -> Result<Self, RegionError> {
        let header = region.get(..HEADER_SIZE).ok_or_else(|| {
            RegionError::Corrupted(format!("region is only {} bytes", region.len()))
        })?;

        if header[0..8] != MAGIC {
            return Err(RegionError::Corrupted(
                "region does not start with the expected magic bytes".to_string(),
            ));
        }

        let version = u32::from_le_bytes(field(header, 8));
        if version != REGION_VERSION {
            return Err(RegionError::IncompatibleVersion(version));
        }

        let slf = Self {
            entry_capacity: u32::from_le_bytes(field(header, 12)),
            capacity: u64::from_le_bytes(field(header, 16)),
            entry_count: u64::from_le_bytes(field(header, 24)),
            free_offset: u64::from_le_bytes(field(header, 32)),
        };
        slf.validate(region.len())?;

        Ok(slf)
    }

    /// Writes the header to the start of the region.
    pub(crate) fn write(&self, region: &mut [u8]) {
        let header = &mut region[..HEADER_SIZE];
        header[0..8].copy_from_slice(&MAGIC);
        header[8..12].copy_from_slice(&REGION_VERSION.to_le_bytes());
        header[12..16].copy_from_slice(&self.entry_capacity.to_le_bytes());
        header[16..24].copy_from_slice(&self.capacity.to_le_bytes());
        header[24..32].copy_from_slice(&self.entry_count.to_le_bytes());
        header[32..40].copy_from_slice(&self.free_offset.to_le_bytes());
        header[40..].fill(0);
    }

    #[inline]
    /// The number of bytes left in the arena.
    pub(crate) fn remaining(&self) -> u64 {
        self.capacity - self.free_offset
    }

    fn validate(&self, region_len: usize) -> Result<(), RegionError> {
        let arena_start = arena_start(self.entry_capacity) as u64;
        let consistent = self.capacity == region_len as u64
            && self.entry_count <= self.entry_capacity as u64
            && self.free_offset >= arena_start
            && self.free_offset <= self.capacity;

        if !consistent {
            return Err(RegionError::Corrupted(format!(
                "inconsistent region header {self:?} for {region_len} byte region"
            )));
        }

        Ok(())
    }
}

#[inline]
/// The offset of the first arena byte for a directory of the given size.
pub(crate) fn arena_start(entry_capacity: u32) -> usize {
    HEADER_SIZE + entry_capacity as usize * ENTRY_SIZE
}

#[inline]
pub(crate) fn field<const N: usize>(header: &[u8], offset: usize) -> [u8; N] {
    let mut bytes = [0; N];
    bytes.copy_from_slice(&header[offset..offset + N]);
    bytes
}
