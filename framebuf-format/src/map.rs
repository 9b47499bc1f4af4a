//! In-place transformation of numeric columns.
//!
//! Values are rewritten element by element at their fixed offsets, the buffer
//! is never resized and no other bytes are touched.

use serde_derive::Serialize;
use tracing::debug;

use crate::codec::find_column;
use crate::column::map_in_place;
use crate::{DataType, FormatError};

#[derive(Debug, Copy, Clone, PartialEq)]
/// A single numeric value passed through a [NumericMap] closure.
pub enum Numeric {
    Int64(i64),
    Float64(f64),
}

impl Numeric {
    #[inline]
    /// Returns the value as an `i64`, floats are truncated towards zero
    /// and saturate at the bounds of `i64`.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Int64(v) => v,
            Self::Float64(v) => v as i64,
        }
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int64(v) => v as f64,
            Self::Float64(v) => v,
        }
    }
}

/// A function applied to every value of a numeric column.
///
/// The result is always stored at the width and type of the column being
/// mapped.
///
/// Any `FnMut(Numeric) -> Numeric` closure implements this trait, values
/// returned in the other numeric type are cast back to the column's type.
pub trait NumericMap {
    fn map_i64(&mut self, value: i64) -> i64;

    fn map_f64(&mut self, value: f64) -> f64;
}

impl<F> NumericMap for F
where
    F: FnMut(Numeric) -> Numeric,
{
    #[inline]
    fn map_i64(&mut self, value: i64) -> i64 {
        self(Numeric::Int64(value)).as_i64()
    }

    #[inline]
    fn map_f64(&mut self, value: f64) -> f64 {
        self(Numeric::Float64(value)).as_f64()
    }
}

/// Returns the value as an `i64` if it is a whole number within range.
fn exact_i64(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (in_range && value.fract() == 0.0).then_some(value as i64)
}

#[derive(Debug, Copy, Clone, PartialEq)]
/// Multiplies every value by a constant factor.
///
/// Whole factors multiply integers exactly with wrapping, fractional
/// factors are applied in floating point and truncated.
pub struct Scale(pub f64);

impl NumericMap for Scale {
    fn map_i64(&mut self, value: i64) -> i64 {
        match exact_i64(self.0) {
            Some(factor) => value.wrapping_mul(factor),
            None => (value as f64 * self.0) as i64,
        }
    }

    #[inline]
    fn map_f64(&mut self, value: f64) -> f64 {
        value * self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
/// Adds a constant to every value.
///
/// Whole deltas are added to integers exactly with wrapping, fractional
/// deltas are applied in floating point and truncated.
pub struct Offset(pub f64);

impl NumericMap for Offset {
    fn map_i64(&mut self, value: i64) -> i64 {
        match exact_i64(self.0) {
            Some(delta) => value.wrapping_add(delta),
            None => (value as f64 + self.0) as i64,
        }
    }

    #[inline]
    fn map_f64(&mut self, value: f64) -> f64 {
        value + self.0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
/// The outcome of [map_numeric_column].
pub enum MapOutcome {
    /// Every value of the column was rewritten.
    Applied { rows: usize },
    /// No column with the given name exists, nothing was changed.
    ColumnNotFound,
    /// The column is not numeric, nothing was changed.
    NotNumeric,
}

/// Applies `f` to every value of the numeric column called `column`, in place.
///
/// If the column does not exist or is a string column, the buffer is left
/// untouched and `f` is never called. Values are read, mapped and written back
/// one at a time in row order without allocating or resizing the buffer.
pub fn map_numeric_column<M: NumericMap>(
    buf: &mut [u8],
    column: &str,
    mut f: M,
) -> Result<MapOutcome, FormatError> {
    let Some(meta) = find_column(buf, column)? else {
        debug!(column, "Column does not exist, skipping map");
        return Ok(MapOutcome::ColumnNotFound);
    };
    let layout = meta.layout;

    let rows = match layout.data_type() {
        DataType::Int64 => map_in_place(buf, &layout, |v: i64| f.map_i64(v))?,
        DataType::Float64 => map_in_place(buf, &layout, |v: f64| f.map_f64(v))?,
        DataType::String => {
            debug!(column, "Column is not numeric, skipping map");
            return Ok(MapOutcome::NotNumeric);
        },
    };

    Ok(MapOutcome::Applied { rows })
}
