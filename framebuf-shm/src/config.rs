use std::path::{Path, PathBuf};

use bon::Builder;

use crate::header::arena_start;
use crate::RegionError;

/// The default size of a new region in bytes.
pub const DEFAULT_CAPACITY: u64 = 200_000_000;
/// The default number of tables a new region can hold.
pub const DEFAULT_ENTRY_CAPACITY: u32 = 1024;
/// The region name used when none is given.
pub const DEFAULT_REGION_NAME: &str = "framebuf";

#[derive(Debug, Clone, Builder)]
/// Options for attaching to, or creating, a shared region.
///
/// `capacity` and `entry_capacity` only apply when the region is created,
/// an existing region keeps the sizes it was created with.
pub struct RegionOptions {
    #[builder(into)]
    /// The name of the region, this becomes the file name within `base_path`.
    pub name: String,
    #[builder(default = DEFAULT_CAPACITY)]
    /// The total size of the region in bytes, including the header
    /// and directory.
    pub capacity: u64,
    #[builder(default = DEFAULT_ENTRY_CAPACITY)]
    /// The maximum number of tables the region can hold.
    pub entry_capacity: u32,
    #[builder(into, default = default_base_path())]
    /// The directory the region file lives in.
    ///
    /// Defaults to `/dev/shm` on Linux and the system temp directory elsewhere.
    pub base_path: PathBuf,
}

impl RegionOptions {
    /// The path of the region file.
    pub fn path(&self) -> PathBuf {
        self.base_path.join(&self.name)
    }

    /// Checks that a new region of `capacity` bytes can hold the header
    /// and a directory of `entry_capacity` entries.
    pub(crate) fn validate_capacity(&self) -> Result<(), RegionError> {
        let required = arena_start(self.entry_capacity) as u64;
        if self.capacity < required || usize::try_from(self.capacity).is_err() {
            return Err(RegionError::CapacityTooSmall {
                capacity: self.capacity,
                required,
            });
        }

        Ok(())
    }
}

/// Region names must be a single, plain path component.
pub(crate) fn validate_region_name(name: &str) -> Result<(), RegionError> {
    let is_plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);

    if !is_plain {
        return Err(RegionError::InvalidRegionName(name.to_string()));
    }
    Ok(())
}

/// The directory regions are created in when no base path is given.
pub fn default_base_path() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if cfg!(target_os = "linux") && shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RegionOptions::builder().name("demo").build();
        assert_eq!(options.capacity, DEFAULT_CAPACITY);
        assert_eq!(options.entry_capacity, DEFAULT_ENTRY_CAPACITY);
        assert_eq!(options.path(), default_base_path().join("demo"));
        assert!(options.validate_capacity().is_ok());
    }

    #[test]
    fn test_capacity_must_fit_directory() {
        let options = RegionOptions::builder()
            .name("demo")
            .capacity(1024)
            .entry_capacity(16)
            .build();
        assert!(matches!(
            options.validate_capacity(),
            Err(RegionError::CapacityTooSmall { capacity: 1024, .. })
        ));
    }

    #[rstest::rstest]
    #[case("framebuf", true)]
    #[case("region-01.shm", true)]
    #[case("", false)]
    #[case(".", false)]
    #[case("..", false)]
    #[case("a/b", false)]
    #[case("../escape", false)]
    fn test_region_names(#[case] name: &str, #[case] is_ok: bool) {
        assert_eq!(validate_region_name(name).is_ok(), is_ok);
    }
}
