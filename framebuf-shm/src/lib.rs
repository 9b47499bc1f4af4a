//! Named tables encoded with [framebuf_format], shared between processes
//! through a fixed size memory mapped region.
//!
//! ```no_run
//! use framebuf_format::{Column, Scale, Table};
//! use framebuf_shm::SharedTableDirectory;
//!
//! let directory = SharedTableDirectory::open_or_create("framebuf", 200_000_000)?;
//!
//! let table = Table::new(vec![Column::new("int_col", vec![1i64, 2, 3])])?;
//! directory.add_table("df1", &table)?;
//!
//! // Any other process attached to `framebuf` now sees `df1`.
//! directory.map_numeric_column("df1", "int_col", Scale(2.0))?;
//! let head = directory.head("df1", 5)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod directory;
mod header;
mod lock;
mod region;

pub use self::config::{
    default_base_path,
    RegionOptions,
    DEFAULT_CAPACITY,
    DEFAULT_ENTRY_CAPACITY,
    DEFAULT_REGION_NAME,
};
pub use self::directory::{DirectoryEntry, MAX_TABLE_NAME_LEN};
pub use self::region::{
    AddOutcome,
    RegionError,
    RegionStats,
    SharedDirectory,
    SharedTableDirectory,
};
