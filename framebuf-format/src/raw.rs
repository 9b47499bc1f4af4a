//! Bounds checked little-endian reads over a raw buffer.

use std::ops::Range;

use crate::FormatError;

/// Every column region, and the blob as a whole, is padded to this alignment.
pub(crate) const ALIGNMENT: usize = 8;

#[inline]
/// Rounds `n` up to the next multiple of [ALIGNMENT].
pub(crate) fn align(n: usize) -> Option<usize> {
    n.checked_add(ALIGNMENT - 1).map(|v| v & !(ALIGNMENT - 1))
}

#[inline]
/// The number of padding bytes required to align `n`.
pub(crate) fn padding(n: usize) -> usize {
    (ALIGNMENT - n % ALIGNMENT) % ALIGNMENT
}

/// Returns `start..start + len` if it lies within a buffer of `buf_len` bytes.
pub(crate) fn checked_range(
    start: usize,
    len: usize,
    buf_len: usize,
) -> Result<Range<usize>, FormatError> {
    match start.checked_add(len) {
        Some(end) if end <= buf_len => Ok(start..end),
        _ => Err(FormatError::Corrupted(format!(
            "range {start}+{len} is out of bounds of {buf_len} byte buffer"
        ))),
    }
}

#[inline]
pub(crate) fn read_array<const N: usize>(
    buf: &[u8],
    offset: usize,
) -> Result<[u8; N], FormatError> {
    let range = checked_range(offset, N, buf.len())?;
    let mut bytes = [0; N];
    bytes.copy_from_slice(&buf[range]);
    Ok(bytes)
}

#[inline]
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32, FormatError> {
    read_array(buf, offset).map(u32::from_le_bytes)
}

#[inline]
pub(crate) fn read_u64(buf: &[u8], offset: usize) -> Result<u64, FormatError> {
    read_array(buf, offset).map(u64::from_le_bytes)
}

/// Reads a `u64` length or offset field and converts it to a `usize`.
pub(crate) fn read_usize(buf: &[u8], offset: usize) -> Result<usize, FormatError> {
    let value = read_u64(buf, offset)?;
    usize::try_from(value).map_err(|_| {
        FormatError::Corrupted(format!("value {value} at {offset} exceeds usize"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(0, 0)]
    #[case(1, 8)]
    #[case(7, 8)]
    #[case(8, 8)]
    #[case(9, 16)]
    fn test_align(#[case] n: usize, #[case] expected: usize) {
        assert_eq!(align(n), Some(expected));
        assert_eq!(n + padding(n), expected);
    }

    #[test]
    fn test_reads_are_bounds_checked() {
        let buf = 7u64.to_le_bytes();
        assert_eq!(read_u64(&buf, 0).unwrap(), 7);
        assert!(read_u64(&buf, 1).is_err());
        assert!(read_u32(&buf, usize::MAX).is_err());
        assert!(checked_range(usize::MAX, 2, 10).is_err());
    }
}
