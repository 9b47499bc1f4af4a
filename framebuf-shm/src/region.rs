use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use framebuf_format::{
    decode_group_by_sum,
    decode_head,
    encode,
    map_numeric_column,
    FormatError,
    GroupedSum,
    MapOutcome,
    NumericMap,
    Table,
};
use memmap2::MmapMut;
use parking_lot::RwLock;
use serde_derive::Serialize;
use tracing::{debug, info, instrument};

use crate::config::validate_region_name;
use crate::directory::{self, validate_table_name, DirectoryEntry};
use crate::header::{arena_start, RegionHeader};
use crate::lock::RegionLock;
use crate::RegionOptions;

const BLOB_ALIGNMENT: u64 = 8;

/// A directory that can be cheaply cloned and shared between
/// threads by being wrapped in an [Arc].
pub type SharedDirectory = Arc<SharedTableDirectory>;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The outcome of [SharedTableDirectory::add_table].
pub enum AddOutcome {
    /// The table was appended to the region.
    Added(DirectoryEntry),
    /// A table with the same name already exists, nothing was written.
    Exists(DirectoryEntry),
}

impl AddOutcome {
    /// The directory entry of the named table.
    pub fn entry(&self) -> &DirectoryEntry {
        match self {
            Self::Added(entry) => entry,
            Self::Exists(entry) => entry,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
/// A snapshot of the region's usage.
pub struct RegionStats {
    /// The total size of the region in bytes.
    pub capacity: u64,
    /// The number of arena bytes used by tables.
    pub used_bytes: u64,
    /// The number of arena bytes still free.
    pub remaining_bytes: u64,
    /// The number of tables in the directory.
    pub table_count: u64,
    /// The maximum number of tables the directory can hold.
    pub table_capacity: u64,
}

impl From<&RegionHeader> for RegionStats {
    fn from(header: &RegionHeader) -> Self {
        Self {
            capacity: header.capacity,
            used_bytes: header.free_offset - arena_start(header.entry_capacity) as u64,
            remaining_bytes: header.remaining(),
            table_count: header.entry_count,
            table_capacity: header.entry_capacity as u64,
        }
    }
}

struct Mapping {
    region: MmapMut,
    lock: RegionLock,
}

/// A named, fixed size shared memory region holding encoded tables.
///
/// Any number of processes can attach to the same region by name, tables
/// added by one process are visible to every other process and can be read
/// or mutated in place without copying them out of the region.
///
/// ### Region Layout
///
/// ```text
/// +--------+--------------------------+--------------------------------+
/// | header | directory                | arena                          |
/// | 64B    | entry_capacity x 128B    | encoded tables, back to back   |
/// +--------+--------------------------+--------------------------------+
/// ```
///
/// Tables are only ever appended, a table's bytes never move once they
/// have been written.
///
/// ### Locking
///
/// Reads hold a shared lock and writes hold an exclusive lock on the region,
/// both within the process and across processes via an advisory file lock.
pub struct SharedTableDirectory {
    name: String,
    path: PathBuf,
    mapping: RwLock<Option<Mapping>>,
}

impl SharedTableDirectory {
    /// Attaches to the region with the given name in the default location,
    /// creating it with `capacity` bytes if it does not already exist.
    pub fn open_or_create(name: &str, capacity: u64) -> Result<Self, RegionError> {
        let options = RegionOptions::builder()
            .name(name)
            .capacity(capacity)
            .build();
        Self::open(options)
    }

    #[instrument(skip_all, fields(region = %options.name))]
    /// Attaches to the region described by the [RegionOptions], creating it
    /// if it does not already exist.
    ///
    /// Concurrent calls from multiple processes are safe, exactly one of them
    /// creates and initialises the region. The capacity options are only
    /// checked when the region is created, attaching ignores them.
    pub fn open(options: RegionOptions) -> Result<Self, RegionError> {
        validate_region_name(&options.name)?;

        let path = options.path();
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                options.validate_capacity()?;
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)?
            },
            Err(e) => return Err(e.into()),
        };
        let lock = RegionLock::new(file);

        let region = {
            let _guard = lock.exclusive()?;
            let is_new = lock.file().metadata()?.len() == 0;
            if is_new {
                // Another process may have created the file without initialising it.
                options.validate_capacity()?;
                info!(path = %path.display(), capacity = options.capacity, "Creating region");
                lock.file().set_len(options.capacity)?;
            }

            // SAFETY: The file is never resized once it has been initialised and
            // all access to the mapping happens while holding the region lock.
            let mut region = unsafe { MmapMut::map_mut(lock.file())? };

            if is_new {
                RegionHeader::new(options.capacity, options.entry_capacity).write(&mut region);
            } else {
                let header = RegionHeader::read(&region)?;
                info!(
                    path = %path.display(),
                    capacity = header.capacity,
                    tables = header.entry_count,
                    "Attached to existing region",
                );
            }

            region
        };

        Ok(Self {
            name: options.name,
            path,
            mapping: RwLock::new(Some(Mapping { region, lock })),
        })
    }

    /// Removes the region with the given name from the default location.
    ///
    /// Returns `false` if no such region exists.
    pub fn destroy(name: &str) -> Result<bool, RegionError> {
        let options = RegionOptions::builder().name(name).build();
        Self::destroy_with_options(&options)
    }

    /// Removes the region described by the [RegionOptions].
    ///
    /// Processes still attached to the region keep their mapping, the
    /// memory is released once the last of them closes it.
    pub fn destroy_with_options(options: &RegionOptions) -> Result<bool, RegionError> {
        validate_region_name(&options.name)?;

        let path = options.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Destroyed region");
                Ok(true)
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[inline]
    /// The name of the region.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    /// The path of the file backing the region.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self, table), fields(region = %self.name))]
    /// Encodes the table and appends it to the region under the given name.
    ///
    /// If a table with the same name already exists the region is left
    /// untouched and [AddOutcome::Exists] is returned.
    pub fn add_table(&self, name: &str, table: &Table) -> Result<AddOutcome, RegionError> {
        validate_table_name(name)?;
        let blob = encode(table)?;

        self.write(|region, mut header| {
            if let Some(existing) = directory::find(region, &header, name)? {
                debug!(table = name, "Table already exists, skipping add");
                return Ok(AddOutcome::Exists(existing));
            }

            if header.entry_count >= header.entry_capacity as u64 {
                return Err(RegionError::DirectoryFull(header.entry_capacity));
            }

            let start = header.free_offset.next_multiple_of(BLOB_ALIGNMENT);
            let required = blob.len() as u64;
            let fits = start
                .checked_add(required)
                .is_some_and(|end| end <= header.capacity);
            if !fits {
                return Err(RegionError::CapacityExceeded {
                    required,
                    remaining: header.remaining(),
                });
            }

            let entry = DirectoryEntry {
                name: name.to_string(),
                position: start..start + required,
            };
            region[start as usize..entry.position.end as usize].copy_from_slice(&blob);
            directory::write_entry(region, header.entry_count as usize, &entry);

            // The header is written last, publishing the entry.
            header.entry_count += 1;
            header.free_offset = entry.position.end;
            header.write(region);

            info!(table = name, bytes = required, offset = start, "Added table");
            Ok(AddOutcome::Added(entry))
        })
    }

    /// Returns the location of the named table within the region.
    pub fn locate(&self, name: &str) -> Result<DirectoryEntry, RegionError> {
        self.read(|region, header| lookup(region, header, name))
    }

    #[instrument(skip(self), fields(region = %self.name))]
    /// Decodes at most `rows` leading rows of the named table.
    pub fn head(&self, name: &str, rows: usize) -> Result<Table, RegionError> {
        self.read(|region, header| {
            let entry = lookup(region, header, name)?;
            Ok(decode_head(blob(region, &entry), rows)?)
        })
    }

    #[instrument(skip(self), fields(region = %self.name))]
    /// Sums `sum_column` grouped by the values of `group_column` in the
    /// named table.
    pub fn group_by_sum(
        &self,
        name: &str,
        group_column: &str,
        sum_column: &str,
    ) -> Result<GroupedSum, RegionError> {
        self.read(|region, header| {
            let entry = lookup(region, header, name)?;
            Ok(decode_group_by_sum(
                blob(region, &entry),
                group_column,
                sum_column,
            )?)
        })
    }

    #[instrument(skip(self, f), fields(region = %self.name))]
    /// Applies `f` to every value of a numeric column of the named table,
    /// in place.
    ///
    /// Missing and string columns leave the table untouched, see
    /// [framebuf_format::map_numeric_column].
    pub fn map_numeric_column<M: NumericMap>(
        &self,
        name: &str,
        column: &str,
        f: M,
    ) -> Result<MapOutcome, RegionError> {
        self.write(|region, header| {
            let entry = lookup(region, &header, name)?;
            let range = entry.position.start as usize..entry.position.end as usize;
            Ok(map_numeric_column(&mut region[range], column, f)?)
        })
    }

    /// Lists every table in the region in the order they were added.
    pub fn tables(&self) -> Result<Vec<DirectoryEntry>, RegionError> {
        self.read(|region, header| directory::list(region, header))
    }

    /// Returns a snapshot of the region's usage.
    pub fn stats(&self) -> Result<RegionStats, RegionError> {
        self.read(|_, header| Ok(RegionStats::from(header)))
    }

    /// The total size of the region in bytes.
    pub fn capacity(&self) -> Result<u64, RegionError> {
        self.stats().map(|stats| stats.capacity)
    }

    /// The number of arena bytes used by tables.
    pub fn used_bytes(&self) -> Result<u64, RegionError> {
        self.stats().map(|stats| stats.used_bytes)
    }

    /// The number of arena bytes still free.
    pub fn remaining_bytes(&self) -> Result<u64, RegionError> {
        self.stats().map(|stats| stats.remaining_bytes)
    }

    /// Detaches this handle from the region.
    ///
    /// The region itself and any other handles remain intact, every later
    /// operation on this handle fails with [RegionError::Closed].
    /// Closing an already closed handle does nothing.
    pub fn close(&self) {
        let mapping = self.mapping.write().take();
        if mapping.is_some() {
            info!(region = %self.name, "Closed region handle");
        }
    }

    /// Returns if the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.mapping.read().is_none()
    }

    fn read<T, F>(&self, op: F) -> Result<T, RegionError>
    where
        F: FnOnce(&[u8], &RegionHeader) -> Result<T, RegionError>,
    {
        let guard = self.mapping.read();
        let mapping = guard.as_ref().ok_or(RegionError::Closed)?;
        let _lock = mapping.lock.shared()?;

        let header = RegionHeader::read(&mapping.region)?;
        op(&mapping.region, &header)
    }

    fn write<T, F>(&self, op: F) -> Result<T, RegionError>
    where
        F: FnOnce(&mut [u8], RegionHeader) -> Result<T, RegionError>,
    {
        let mut guard = self.mapping.write();
        let mapping = guard.as_mut().ok_or(RegionError::Closed)?;
        let _lock = mapping.lock.exclusive()?;

        let header = RegionHeader::read(&mapping.region)?;
        op(&mut mapping.region, header)
    }
}

fn lookup(
    region: &[u8],
    header: &RegionHeader,
    name: &str,
) -> Result<DirectoryEntry, RegionError> {
    directory::find(region, header, name)?
        .ok_or_else(|| RegionError::TableNotFound(name.to_string()))
}

#[inline]
fn blob<'a>(region: &'a [u8], entry: &DirectoryEntry) -> &'a [u8] {
    &region[entry.position.start as usize..entry.position.end as usize]
}

#[derive(Debug, thiserror::Error)]
/// An error that can occur while operating on a shared region.
pub enum RegionError {
    #[error("IO Error: {0}")]
    /// An IO error that occurred while attempting to complete
    /// the operation.
    IoError(#[from] io::Error),
    #[error("Format Error: {0}")]
    /// An error from encoding a table or accessing an encoded table.
    FormatError(#[from] FormatError),
    #[error("Table not found: {0:?}")]
    /// No table exists within the region with the given name.
    TableNotFound(String),
    #[error("Region capacity exceeded: {required} bytes required, {remaining} bytes remaining")]
    /// The encoded table does not fit in the remaining arena space.
    CapacityExceeded { required: u64, remaining: u64 },
    #[error("Region directory is full: {0} tables")]
    /// The directory has no free entries left.
    DirectoryFull(u32),
    #[error("Invalid table name: {0:?}")]
    /// The table name is empty or too long to store in the directory.
    InvalidTableName(String),
    #[error("Invalid region name: {0:?}")]
    /// The region name is not a single plain file name.
    InvalidRegionName(String),
    #[error("Region capacity of {capacity} bytes is too small, at least {required} bytes required")]
    /// The requested capacity cannot hold the region header and directory.
    CapacityTooSmall { capacity: u64, required: u64 },
    #[error("Incompatible region version: {0}")]
    /// The region was created by an incompatible version.
    IncompatibleVersion(u32),
    #[error("Region Corrupted: {0}")]
    /// Some part of the region data is corrupted.
    Corrupted(String),
    #[error("Region handle is closed")]
    /// The handle has been closed with [SharedTableDirectory::close].
    Closed,
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use framebuf_format::{Column, ColumnData, GroupKey, Offset, Scale, Sum};
    use tempfile::TempDir;

    use super::*;

    fn options(tmp_dir: &TempDir) -> RegionOptions {
        RegionOptions::builder()
            .name(ulid::Ulid::new().to_string())
            .base_path(tmp_dir.path())
            .capacity(1 << 20)
            .entry_capacity(16)
            .build()
    }

    fn sample_table() -> Table {
        Table::new(vec![
            Column::new("int_col", vec![1i64, 2, 3]),
            Column::new("float_col", vec![1.5f64, 2.5, 3.5]),
            Column::new("string_col", vec!["A", "B", "C"]),
        ])
        .unwrap()
    }

    fn int_table(values: Vec<i64>) -> Table {
        Table::new(vec![Column::new("value", values)]).unwrap()
    }

    #[test]
    fn test_create_new_region() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);
        let directory = SharedTableDirectory::open(options.clone()).expect("Create region");

        assert_eq!(directory.path(), options.path());
        assert_eq!(std::fs::metadata(options.path()).unwrap().len(), 1 << 20);

        let stats = directory.stats().unwrap();
        assert_eq!(stats.capacity, 1 << 20);
        assert_eq!(stats.used_bytes, 0);
        assert_eq!(stats.table_count, 0);
        assert_eq!(stats.table_capacity, 16);
        assert!(directory.tables().unwrap().is_empty());
    }

    #[test]
    fn test_two_handles_share_tables() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);

        let writer = SharedTableDirectory::open(options.clone()).unwrap();
        let reader = SharedTableDirectory::open(options).unwrap();

        let outcome = writer.add_table("df1", &sample_table()).unwrap();
        assert!(matches!(outcome, AddOutcome::Added(_)));
        assert_eq!(reader.locate("df1").unwrap(), *outcome.entry());

        let head = reader.head("df1", 5).unwrap();
        assert_eq!(head, sample_table());

        let outcome = reader
            .map_numeric_column("df1", "int_col", Scale(2.0))
            .unwrap();
        assert_eq!(outcome, MapOutcome::Applied { rows: 3 });

        let head = writer.head("df1", 2).unwrap();
        assert_eq!(head.row_count(), 2);
        assert_eq!(
            head.column("int_col").unwrap().data,
            ColumnData::Int64(vec![2, 4])
        );
        assert_eq!(
            head.column("string_col").unwrap().data,
            ColumnData::from(vec!["A", "B"])
        );
    }

    #[test]
    fn test_reopen_keeps_tables_and_sizes() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);

        let directory = SharedTableDirectory::open(options.clone()).unwrap();
        directory.add_table("df1", &sample_table()).unwrap();
        drop(directory);

        let options = RegionOptions {
            capacity: 1 << 30,
            ..options
        };
        let directory = SharedTableDirectory::open(options).unwrap();
        assert_eq!(directory.capacity().unwrap(), 1 << 20);
        assert_eq!(directory.head("df1", 5).unwrap(), sample_table());
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let directory = SharedTableDirectory::open(options(&tmp_dir)).unwrap();

        let first = directory.add_table("df1", &sample_table()).unwrap();
        let used = directory.used_bytes().unwrap();

        let second = directory
            .add_table("df1", &int_table(vec![7, 8, 9, 10]))
            .unwrap();
        assert_eq!(second, AddOutcome::Exists(first.entry().clone()));
        assert_eq!(directory.used_bytes().unwrap(), used);
        assert_eq!(directory.tables().unwrap().len(), 1);
        assert_eq!(directory.head("df1", 5).unwrap(), sample_table());
    }

    #[test]
    fn test_capacity_exceeded_keeps_earlier_tables() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = RegionOptions {
            capacity: arena_start(4) as u64 + 256,
            entry_capacity: 4,
            ..options(&tmp_dir)
        };
        let directory = SharedTableDirectory::open(options).unwrap();

        directory.add_table("small", &int_table(vec![1, 2, 3])).unwrap();
        let remaining = directory.remaining_bytes().unwrap();

        let result = directory.add_table("large", &int_table((0..64).collect()));
        let Err(RegionError::CapacityExceeded {
            required,
            remaining: reported,
        }) = result
        else {
            panic!("Expected capacity error, got {result:?}");
        };
        assert!(required > remaining);
        assert_eq!(reported, remaining);

        assert_eq!(directory.remaining_bytes().unwrap(), remaining);
        assert!(matches!(
            directory.locate("large"),
            Err(RegionError::TableNotFound(_))
        ));
        assert_eq!(
            directory.head("small", 5).unwrap(),
            int_table(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_directory_full() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = RegionOptions {
            entry_capacity: 2,
            ..options(&tmp_dir)
        };
        let directory = SharedTableDirectory::open(options).unwrap();

        directory.add_table("a", &int_table(vec![1])).unwrap();
        directory.add_table("b", &int_table(vec![2])).unwrap();
        let result = directory.add_table("c", &int_table(vec![3]));
        assert!(matches!(result, Err(RegionError::DirectoryFull(2))));

        // Duplicates are still a no-op once the directory is full.
        let result = directory.add_table("a", &int_table(vec![4])).unwrap();
        assert!(matches!(result, AddOutcome::Exists(_)));
    }

    #[test]
    fn test_table_not_found() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let directory = SharedTableDirectory::open(options(&tmp_dir)).unwrap();

        assert!(matches!(
            directory.locate("missing"),
            Err(RegionError::TableNotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            directory.head("missing", 5),
            Err(RegionError::TableNotFound(_))
        ));
        assert!(matches!(
            directory.map_numeric_column("missing", "int_col", Offset(1.0)),
            Err(RegionError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_table_name() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let directory = SharedTableDirectory::open(options(&tmp_dir)).unwrap();

        let name = "x".repeat(crate::MAX_TABLE_NAME_LEN + 1);
        assert!(matches!(
            directory.add_table(&name, &sample_table()),
            Err(RegionError::InvalidTableName(_))
        ));
        assert!(matches!(
            directory.add_table("", &sample_table()),
            Err(RegionError::InvalidTableName(_))
        ));
        assert_eq!(directory.used_bytes().unwrap(), 0);
    }

    #[test]
    fn test_group_by_sum_and_column_errors() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let directory = SharedTableDirectory::open(options(&tmp_dir)).unwrap();

        let table = Table::new(vec![
            Column::new("group_col", vec![1i64, 1, 2]),
            Column::new("sum_col", vec![10i64, 20, 5]),
        ])
        .unwrap();
        directory.add_table("df", &table).unwrap();

        let result = directory.group_by_sum("df", "group_col", "sum_col").unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(&GroupKey::Int64(1)), Some(Sum::Int64(30)));
        assert_eq!(result.get(&GroupKey::Int64(2)), Some(Sum::Int64(5)));

        assert!(matches!(
            directory.group_by_sum("df", "group_col", "nope"),
            Err(RegionError::FormatError(FormatError::NotFound(name))) if name == "nope"
        ));
    }

    #[test]
    fn test_map_string_column_is_noop() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let directory = SharedTableDirectory::open(options(&tmp_dir)).unwrap();
        directory.add_table("df1", &sample_table()).unwrap();

        let outcome = directory
            .map_numeric_column("df1", "string_col", Scale(2.0))
            .unwrap();
        assert_eq!(outcome, MapOutcome::NotNumeric);
        let outcome = directory
            .map_numeric_column("df1", "nope", Scale(2.0))
            .unwrap();
        assert_eq!(outcome, MapOutcome::ColumnNotFound);
        assert_eq!(directory.head("df1", 5).unwrap(), sample_table());
    }

    #[test]
    fn test_close_is_idempotent() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);
        let directory = SharedTableDirectory::open(options.clone()).unwrap();
        let other = SharedTableDirectory::open(options).unwrap();
        directory.add_table("df1", &sample_table()).unwrap();

        directory.close();
        directory.close();
        assert!(directory.is_closed());

        assert!(matches!(directory.locate("df1"), Err(RegionError::Closed)));
        assert!(matches!(directory.tables(), Err(RegionError::Closed)));
        assert!(matches!(
            directory.add_table("df2", &sample_table()),
            Err(RegionError::Closed)
        ));

        assert!(!other.is_closed());
        assert_eq!(other.head("df1", 5).unwrap(), sample_table());
    }

    #[test]
    fn test_concurrent_adds() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);
        let shared: SharedDirectory = Arc::new(SharedTableDirectory::open(options.clone()).unwrap());

        let num_threads = 8;
        let barrier = Arc::new(Barrier::new(num_threads));
        let handles: Vec<_> = (0..num_threads)
            .map(|i| {
                let barrier = barrier.clone();
                let shared = shared.clone();
                let options = options.clone();
                thread::spawn(move || {
                    // Half of the threads share a handle, the others open their own.
                    let own;
                    let directory = if i % 2 == 0 {
                        &*shared
                    } else {
                        own = SharedTableDirectory::open(options).unwrap();
                        &own
                    };

                    barrier.wait();
                    let table = int_table(vec![i as i64; i + 1]);
                    directory.add_table(&format!("table-{i}"), &table).unwrap();
                    directory.add_table("contended", &table).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let tables = shared.tables().unwrap();
        assert_eq!(tables.len(), num_threads + 1);
        assert_eq!(
            tables.iter().filter(|e| e.name == "contended").count(),
            1
        );

        for i in 0..num_threads {
            let head = shared.head(&format!("table-{i}"), usize::MAX).unwrap();
            assert_eq!(head, int_table(vec![i as i64; i + 1]));
        }

        let mut positions: Vec<_> = tables.iter().map(|e| e.position.clone()).collect();
        positions.sort_by_key(|p| p.start);
        for pair in positions.windows(2) {
            assert!(pair[0].end <= pair[1].start, "Tables overlap: {pair:?}");
        }
    }

    #[test]
    fn test_readers_never_observe_partial_map() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);
        let writer = SharedTableDirectory::open(options.clone()).unwrap();
        writer.add_table("df", &int_table(vec![0; 1000])).unwrap();

        let reader = thread::spawn(move || {
            let reader = SharedTableDirectory::open(options).unwrap();
            for _ in 0..200 {
                let head = reader.head("df", usize::MAX).unwrap();
                let ColumnData::Int64(values) = &head.columns()[0].data else {
                    panic!("Expected int column");
                };
                assert!(values.iter().all(|v| *v == values[0]), "Observed a torn map");
            }
        });

        for _ in 0..200 {
            writer.map_numeric_column("df", "value", Offset(1.0)).unwrap();
        }
        reader.join().unwrap();

        let head = writer.head("df", 1).unwrap();
        assert_eq!(head.columns()[0].data, ColumnData::Int64(vec![200]));
    }

    #[test]
    fn test_attach_to_corrupted_region() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);
        std::fs::write(options.path(), vec![0xAB; 4096]).unwrap();

        let result = SharedTableDirectory::open(options);
        assert!(matches!(result, Err(RegionError::Corrupted(_))));
    }

    #[test]
    fn test_destroy_region() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);

        let directory = SharedTableDirectory::open(options.clone()).unwrap();
        directory.add_table("df1", &sample_table()).unwrap();

        assert!(SharedTableDirectory::destroy_with_options(&options).unwrap());
        assert!(!options.path().exists());
        assert!(!SharedTableDirectory::destroy_with_options(&options).unwrap());

        // The existing mapping stays valid until closed.
        assert_eq!(directory.head("df1", 5).unwrap(), sample_table());
        directory.close();

        let directory = SharedTableDirectory::open(options).unwrap();
        assert!(directory.tables().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_options() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let bad_name = RegionOptions {
            name: "../escape".to_string(),
            ..options(&tmp_dir)
        };
        assert!(matches!(
            SharedTableDirectory::open(bad_name),
            Err(RegionError::InvalidRegionName(_))
        ));

        let too_small = RegionOptions {
            capacity: 64,
            ..options(&tmp_dir)
        };
        let path = too_small.path();
        assert!(matches!(
            SharedTableDirectory::open(too_small),
            Err(RegionError::CapacityTooSmall { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_attach_ignores_requested_capacity() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = options(&tmp_dir);

        let directory = SharedTableDirectory::open(options.clone()).unwrap();
        directory.add_table("df1", &sample_table()).unwrap();

        let attach = RegionOptions {
            capacity: 4096,
            ..options
        };
        let other = SharedTableDirectory::open(attach).unwrap();
        assert_eq!(other.capacity().unwrap(), 1 << 20);
        assert_eq!(other.stats().unwrap().table_capacity, 16);
        assert_eq!(other.head("df1", 5).unwrap(), sample_table());
    }

    #[test]
    fn test_uninitialised_file_checks_capacity() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let options = RegionOptions {
            capacity: 64,
            ..options(&tmp_dir)
        };
        std::fs::File::create(options.path()).unwrap();

        assert!(matches!(
            SharedTableDirectory::open(options.clone()),
            Err(RegionError::CapacityTooSmall { capacity: 64, .. })
        ));
        assert_eq!(std::fs::metadata(options.path()).unwrap().len(), 0);
    }
}
