mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use framebuf_shm::{
    default_base_path,
    RegionOptions,
    DEFAULT_CAPACITY,
    DEFAULT_ENTRY_CAPACITY,
    DEFAULT_REGION_NAME,
};
use tracing::debug;

use crate::logging::init_logging;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Parser)]
#[command(version, about)]
/// framebuf, columnar tables shared between processes.
///
/// Tables are encoded once into a shared memory region, any process attached
/// to the region can then read, aggregate and mutate them in place.
pub struct Args {
    #[arg(long, env = "FRAMEBUF_LOG_LEVEL", default_value = "info")]
    /// Set the log level.
    ///
    /// This can filter on various levels, for example `info,framebuf_shm=warn`
    /// will display all logs at `info` level severity and above, except for log
    /// events that appear within the `framebuf_shm` crate.
    log_level: String,
    #[arg(long, env = "FRAMEBUF_LOG_JSON")]
    /// Emit logs in JSON format rather than as plain text.
    log_json: bool,
    #[arg(long, env = "FRAMEBUF_LOG_NO_ANSI")]
    /// Disable ANSI colour codes being present in the logs.
    ///
    /// ANSI codes can cause rendering issues on various observability platforms
    /// or text file logging due to its escape sequences.
    log_no_ansi: bool,
    #[arg(long, env = "FRAMEBUF_REGION", default_value = DEFAULT_REGION_NAME)]
    /// The name of the shared region to operate on.
    region: String,
    #[arg(long, env = "FRAMEBUF_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    /// The size of the region in bytes when it is created.
    ///
    /// Has no effect on a region which already exists.
    capacity: u64,
    #[arg(long, env = "FRAMEBUF_ENTRIES", default_value_t = DEFAULT_ENTRY_CAPACITY)]
    /// The maximum number of tables the region can hold when it is created.
    ///
    /// Has no effect on a region which already exists.
    entries: u32,
    #[arg(long, env = "FRAMEBUF_SHM_DIR")]
    /// The directory the region file lives in.
    ///
    /// Defaults to `/dev/shm` on Linux and the system temp directory elsewhere.
    shm_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: commands::Commands,
}

impl Args {
    fn region_options(&self) -> RegionOptions {
        RegionOptions::builder()
            .name(self.region.as_str())
            .capacity(self.capacity)
            .entry_capacity(self.entries)
            .base_path(self.shm_dir.clone().unwrap_or_else(default_base_path))
            .build()
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args).context("Init logging")?;

    debug!("framebuf v{}", env!("CARGO_PKG_VERSION"));

    let options = args.region_options();
    args.command.execute(options)
}
