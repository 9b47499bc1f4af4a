use std::fmt::{Display, Formatter};

use serde_derive::{Deserialize, Serialize};

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The data type of the column as stored in an encoded table.
///
/// The discriminant is the tag written into the column metadata, so
/// existing values must never be renumbered.
///
/// These types have no concept of nested structures.
pub enum DataType {
    Int64 = 1,
    Float64 = 2,
    String = 3,
}

impl DataType {
    #[inline]
    /// Returns the tag written to the column metadata.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Attempts to resolve a column metadata tag back into a [DataType].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Int64),
            2 => Some(Self::Float64),
            3 => Some(Self::String),
            _ => None,
        }
    }

    #[inline]
    /// The width in bytes of every element, for fixed-width types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Int64 | Self::Float64 => Some(8),
            Self::String => None,
        }
    }

    #[inline]
    /// Returns if values of this type can be summed and mapped in place.
    pub fn is_numeric(self) -> bool {
        self.fixed_width().is_some()
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::String => "string",
        };
        f.write_str(name)
    }
}
