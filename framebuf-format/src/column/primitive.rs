//! Access for fixed width numeric columns.
//!
//! Values are read and written as exact 8 byte little-endian bit patterns,
//! floats are never round tripped through any other representation.

use super::{ColumnLayout, NUMERIC_WIDTH};
use crate::raw::checked_range;
use crate::{DataType, FormatError};

/// A fixed width value which can be stored in a numeric column.
pub(crate) trait Primitive: Copy {
    /// The column type storing values of this type.
    const DATA_TYPE: DataType;

    fn from_le(bytes: [u8; NUMERIC_WIDTH]) -> Self;

    fn to_le(self) -> [u8; NUMERIC_WIDTH];
}

impl Primitive for i64 {
    const DATA_TYPE: DataType = DataType::Int64;

    #[inline]
    fn from_le(bytes: [u8; NUMERIC_WIDTH]) -> Self {
        i64::from_le_bytes(bytes)
    }

    #[inline]
    fn to_le(self) -> [u8; NUMERIC_WIDTH] {
        self.to_le_bytes()
    }
}

impl Primitive for f64 {
    const DATA_TYPE: DataType = DataType::Float64;

    #[inline]
    fn from_le(bytes: [u8; NUMERIC_WIDTH]) -> Self {
        f64::from_le_bytes(bytes)
    }

    #[inline]
    fn to_le(self) -> [u8; NUMERIC_WIDTH] {
        self.to_le_bytes()
    }
}

#[inline]
fn decode_chunk<T: Primitive>(chunk: &[u8]) -> T {
    let mut bytes = [0; NUMERIC_WIDTH];
    bytes.copy_from_slice(chunk);
    T::from_le(bytes)
}

fn check_type<T: Primitive>(layout: &ColumnLayout) -> Result<(), FormatError> {
    if layout.data_type() != T::DATA_TYPE {
        return Err(FormatError::Corrupted(format!(
            "attempted to read {} column as {}",
            layout.data_type(),
            T::DATA_TYPE,
        )));
    }
    Ok(())
}

/// Reads the value at `index` of the column.
pub(crate) fn read_element<T: Primitive>(
    buf: &[u8],
    layout: &ColumnLayout,
    index: usize,
) -> Result<T, FormatError> {
    check_type::<T>(layout)?;
    let range = layout.element_range(index).ok_or_else(|| {
        FormatError::Corrupted(format!(
            "row {index} is out of bounds of {} rows",
            layout.rows()
        ))
    })?;
    let range = checked_range(range.start, NUMERIC_WIDTH, buf.len())?;
    Ok(decode_chunk(&buf[range]))
}

/// Reads the first `limit` values of the column.
pub(crate) fn read_prefix<T: Primitive>(
    buf: &[u8],
    layout: &ColumnLayout,
    limit: usize,
) -> Result<Vec<T>, FormatError> {
    check_type::<T>(layout)?;
    let limit = limit.min(layout.rows());
    let range = checked_range(layout.data_offset(), limit * NUMERIC_WIDTH, buf.len())?;

    let values = buf[range]
        .chunks_exact(NUMERIC_WIDTH)
        .map(decode_chunk)
        .collect();
    Ok(values)
}

/// Rewrites every value of the column with the result of `f`, in row order.
///
/// Only the bytes of the data vector are touched.
pub(crate) fn map_in_place<T: Primitive>(
    buf: &mut [u8],
    layout: &ColumnLayout,
    mut f: impl FnMut(T) -> T,
) -> Result<usize, FormatError> {
    check_type::<T>(layout)?;
    let range = layout.data_range();
    let range = checked_range(range.start, range.len(), buf.len())?;

    for chunk in buf[range].chunks_exact_mut(NUMERIC_WIDTH) {
        let value = decode_chunk::<T>(chunk);
        chunk.copy_from_slice(&f(value).to_le());
    }

    Ok(layout.rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{decode_column_metadata, encode_column};
    use crate::Column;

    #[test]
    fn test_read_element() {
        let buf = encode_column(&Column::new("n", vec![10i64, 20, 30])).unwrap();
        let layout = decode_column_metadata(&buf, 0).unwrap().layout;
        assert_eq!(read_element::<i64>(&buf, &layout, 0).unwrap(), 10);
        assert_eq!(read_element::<i64>(&buf, &layout, 2).unwrap(), 30);
        assert!(read_element::<i64>(&buf, &layout, 3).is_err());
        assert!(read_element::<f64>(&buf, &layout, 0).is_err());
    }

    #[test]
    fn test_map_in_place_only_touches_data() {
        let mut buf = encode_column(&Column::new("n", vec![1.5f64, 2.5])).unwrap();
        let original = buf.clone();
        let layout = decode_column_metadata(&buf, 0).unwrap().layout;

        let rows = map_in_place::<f64>(&mut buf, &layout, |v| v * 4.0).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(read_prefix::<f64>(&buf, &layout, 2).unwrap(), vec![6.0, 10.0]);

        let data = layout.data_range();
        assert_eq!(buf[..data.start], original[..data.start]);
        assert_eq!(buf[data.end..], original[data.end..]);
    }
}
