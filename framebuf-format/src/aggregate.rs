//! Grouped sums computed directly over an encoded table.

use std::cmp::Ordering;

use serde_derive::Serialize;
use tracing::debug;

use crate::column::{read_element, read_string, ColumnLayout, Primitive};
use crate::{DataType, FormatError, TableHeader};

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
/// A distinct value of the grouping column.
///
/// Keys are totally ordered, floats are compared using the IEEE-754
/// total order with `-0.0` equal to `0.0`. Keys of different types never appear within the same
/// result but are ordered by type for completeness.
pub enum GroupKey {
    Int64(i64),
    Float64(f64),
    String(String),
}

impl GroupKey {
    fn rank(&self) -> u8 {
        match self {
            Self::Int64(_) => 0,
            Self::Float64(_) => 1,
            Self::String(_) => 2,
        }
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Float64(a), Self::Float64(b)) => fold_zero(*a).total_cmp(&fold_zero(*b)),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[inline]
fn fold_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl From<i64> for GroupKey {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for GroupKey {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(untagged)]
/// The sum of a group, in the native type of the summed column.
pub enum Sum {
    Int64(i64),
    Float64(f64),
}

#[derive(Debug, Clone, Serialize)]
/// The result of a grouped sum, one entry per distinct key in ascending key order.
pub struct GroupedSum {
    group_column: String,
    sum_column: String,
    groups: Vec<(GroupKey, Sum)>,
}

impl GroupedSum {
    pub fn group_column(&self) -> &str {
        &self.group_column
    }

    pub fn sum_column(&self) -> &str {
        &self.sum_column
    }

    #[inline]
    /// The number of distinct groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the sum of the given group if it exists.
    pub fn get(&self, key: &GroupKey) -> Option<Sum> {
        self.groups
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|index| self.groups[index].1)
    }

    /// Iterates over the groups in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, Sum)> {
        self.groups.iter().map(|(key, sum)| (key, *sum))
    }
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
/// A group key borrowed from the encoded buffer while accumulating.
enum KeyRef<'a> {
    Int64(i64),
    /// The bit pattern of the float, with `-0.0` folded into `0.0`.
    Float64(u64),
    String(&'a str),
}

impl<'a> KeyRef<'a> {
    fn read(buf: &'a [u8], layout: &ColumnLayout, row: usize) -> Result<Self, FormatError> {
        let key = match layout.data_type() {
            DataType::Int64 => Self::Int64(read_element(buf, layout, row)?),
            DataType::Float64 => {
                let value: f64 = read_element(buf, layout, row)?;
                Self::Float64(fold_zero(value).to_bits())
            },
            DataType::String => Self::String(read_string(buf, layout, row)?),
        };
        Ok(key)
    }

    fn into_owned(self) -> GroupKey {
        match self {
            Self::Int64(v) => GroupKey::Int64(v),
            Self::Float64(bits) => GroupKey::Float64(f64::from_bits(bits)),
            Self::String(v) => GroupKey::String(v.to_string()),
        }
    }
}

/// A numeric type which can be summed without widening.
trait Summable: Primitive {
    fn add(self, other: Self) -> Self;

    fn into_sum(self) -> Sum;
}

impl Summable for i64 {
    #[inline]
    fn add(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn into_sum(self) -> Sum {
        Sum::Int64(self)
    }
}

impl Summable for f64 {
    #[inline]
    fn add(self, other: Self) -> Self {
        self + other
    }

    fn into_sum(self) -> Sum {
        Sum::Float64(self)
    }
}

/// Groups the rows by the value of `group_column` and sums `sum_column`
/// within each group.
///
/// Only the two named columns are decoded, in a single pass pairing values
/// by row index. Integer sums wrap on overflow, float sums are accumulated
/// in row order.
///
/// Returns [FormatError::NotFound] if either column does not exist and
/// [FormatError::TypeMismatch] if the summed column is not numeric.
pub fn decode_group_by_sum(
    buf: &[u8],
    group_column: &str,
    sum_column: &str,
) -> Result<GroupedSum, FormatError> {
    let header = TableHeader::decode(buf)?;

    let mut group = None;
    let mut sum = None;
    for meta in header.columns() {
        let meta = meta?;
        if group.is_none() && meta.name == group_column {
            group = Some(meta.layout);
        }
        if sum.is_none() && meta.name == sum_column {
            sum = Some(meta.layout);
        }
        if group.is_some() && sum.is_some() {
            break;
        }
    }

    let group = group.ok_or_else(|| FormatError::NotFound(group_column.to_string()))?;
    let sum = sum.ok_or_else(|| FormatError::NotFound(sum_column.to_string()))?;

    if group.rows() != sum.rows() {
        return Err(FormatError::Corrupted(format!(
            "column {group_column:?} has {} rows but {sum_column:?} has {}",
            group.rows(),
            sum.rows(),
        )));
    }

    let mut groups = match sum.data_type() {
        DataType::Int64 => accumulate::<i64>(buf, &group, &sum)?,
        DataType::Float64 => accumulate::<f64>(buf, &group, &sum)?,
        DataType::String => {
            return Err(FormatError::TypeMismatch {
                column: sum_column.to_string(),
                expected: "numeric",
                actual: DataType::String,
            })
        },
    };
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    debug!(
        group_column,
        sum_column,
        rows = group.rows(),
        groups = groups.len(),
        "Computed grouped sum"
    );

    Ok(GroupedSum {
        group_column: group_column.to_string(),
        sum_column: sum_column.to_string(),
        groups,
    })
}

fn accumulate<T: Summable>(
    buf: &[u8],
    group: &ColumnLayout,
    sum: &ColumnLayout,
) -> Result<Vec<(GroupKey, Sum)>, FormatError> {
    let mut groups: ahash::HashMap<KeyRef<'_>, T> = ahash::HashMap::default();

    for row in 0..sum.rows() {
        let key = KeyRef::read(buf, group, row)?;
        let value: T = read_element(buf, sum, row)?;
        groups
            .entry(key)
            .and_modify(|acc| *acc = acc.add(value))
            .or_insert(value);
    }

    Ok(groups
        .into_iter()
        .map(|(key, acc)| (key.into_owned(), acc.into_sum()))
        .collect())
}
