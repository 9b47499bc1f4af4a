//! A self-describing columnar encoding for tables.
//!
//! Tables are encoded once into a single buffer which can then be accessed
//! directly without deserializing the whole table:
//!
//! - [decode_head] materializes a bounded prefix of rows.
//! - [decode_group_by_sum] computes a grouped sum over two columns.
//! - [map_numeric_column] rewrites a numeric column in place.
//!
//! ```
//! use framebuf_format::{decode_head, encode, map_numeric_column, Column, ColumnData, Scale, Table};
//!
//! let table = Table::new(vec![
//!     Column::new("int_col", vec![1i64, 2, 3]),
//!     Column::new("string_col", vec!["A", "B", "C"]),
//! ])?;
//!
//! let mut buf = encode(&table)?;
//! map_numeric_column(&mut buf, "int_col", Scale(2.0))?;
//!
//! let head = decode_head(&buf, 2)?;
//! assert_eq!(head.columns()[0].data, ColumnData::Int64(vec![2, 4]));
//! # Ok::<(), framebuf_format::FormatError>(())
//! ```

mod aggregate;
mod codec;
mod column;
mod datatype;
mod error;
mod head;
mod map;
mod raw;
mod table;

pub use self::aggregate::{decode_group_by_sum, GroupKey, GroupedSum, Sum};
pub use self::codec::{decode_table_header, encode, find_column, TableHeader, FORMAT_VERSION, MAGIC};
pub use self::column::{
    decode_column_metadata,
    encode_column,
    read_string,
    ColumnLayout,
    ColumnMeta,
    NUMERIC_WIDTH,
};
pub use self::datatype::DataType;
pub use self::error::FormatError;
pub use self::head::{decode_head, decode_table, DEFAULT_HEAD_ROWS};
pub use self::map::{map_numeric_column, MapOutcome, Numeric, NumericMap, Offset, Scale};
pub use self::table::{Column, ColumnData, Table};
