use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use framebuf_format::{
    ColumnData,
    MapOutcome,
    NumericMap,
    Offset,
    Scale,
    Table,
    DEFAULT_HEAD_ROWS,
};
use framebuf_shm::{AddOutcome, DirectoryEntry, RegionOptions, RegionStats, SharedTableDirectory};
use serde_derive::Serialize;
use tracing::{info, warn};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the region, or attach to it if it already exists, and print its usage.
    Create,
    /// Import a table from a JSON file into the region.
    ///
    /// The file must contain `{"columns": [{"name": "a", "data": {"int64": [1, 2]}}]}`
    /// where the data of each column is one of `int64`, `float64` or `string`.
    Import {
        /// The name to store the table under.
        name: String,
        /// The JSON file containing the table.
        file: PathBuf,
    },
    /// List the tables in the region along with the region usage.
    List,
    /// Print the leading rows of a table as JSON.
    ///
    /// Fails if a printed float is NaN or infinite, JSON cannot represent it.
    Head {
        /// The name of the table.
        name: String,
        #[arg(short, long, default_value_t = DEFAULT_HEAD_ROWS)]
        /// The maximum number of rows to print.
        rows: usize,
    },
    /// Print the sum of a column grouped by the values of another column.
    GroupBySum {
        /// The name of the table.
        name: String,
        /// The column to group by.
        group: String,
        /// The numeric column to sum.
        sum: String,
    },
    /// Multiply every value of a numeric column by a factor, in place.
    Scale {
        /// The name of the table.
        name: String,
        /// The numeric column to scale.
        column: String,
        #[arg(allow_negative_numbers = true)]
        /// The factor to multiply each value by.
        factor: f64,
    },
    /// Add a constant to every value of a numeric column, in place.
    Offset {
        /// The name of the table.
        name: String,
        /// The numeric column to offset.
        column: String,
        #[arg(allow_negative_numbers = true)]
        /// The value to add to each value.
        delta: f64,
    },
    /// Remove the region.
    ///
    /// Processes still attached to the region keep their view of it until they exit.
    Destroy,
}

#[derive(Serialize)]
struct Listing {
    stats: RegionStats,
    tables: Vec<DirectoryEntry>,
}

#[derive(Serialize)]
struct Imported<'a> {
    added: bool,
    #[serde(flatten)]
    entry: &'a DirectoryEntry,
}

#[derive(Serialize)]
struct Destroyed {
    destroyed: bool,
}

impl Commands {
    /// Executes the command against the region described by the options.
    pub fn execute(self, options: RegionOptions) -> Result<()> {
        match self {
            Commands::Create => print_json(&open(options)?.stats()?),
            Commands::Import { name, file } => {
                let table = read_table(&file)?;
                let outcome = open(options)?
                    .add_table(&name, &table)
                    .with_context(|| format!("Add table {name:?}"))?;

                if let AddOutcome::Exists(_) = &outcome {
                    warn!(table = %name, "Table already exists, import skipped");
                }

                print_json(&Imported {
                    added: matches!(outcome, AddOutcome::Added(_)),
                    entry: outcome.entry(),
                })
            },
            Commands::List => {
                let directory = open(options)?;
                print_json(&Listing {
                    stats: directory.stats()?,
                    tables: directory.tables()?,
                })
            },
            Commands::Head { name, rows } => {
                let table = open(options)?
                    .head(&name, rows)
                    .with_context(|| format!("Read head of table {name:?}"))?;
                ensure_finite(&table)?;
                print_json(&table)
            },
            Commands::GroupBySum { name, group, sum } => {
                let result = open(options)?
                    .group_by_sum(&name, &group, &sum)
                    .with_context(|| format!("Group table {name:?}"))?;
                print_json(&result)
            },
            Commands::Scale {
                name,
                column,
                factor,
            } => map_column(&open(options)?, &name, &column, Scale(factor)),
            Commands::Offset {
                name,
                column,
                delta,
            } => map_column(&open(options)?, &name, &column, Offset(delta)),
            Commands::Destroy => {
                let destroyed = SharedTableDirectory::destroy_with_options(&options)
                    .context("Destroy region")?;
                if !destroyed {
                    warn!(region = %options.name, "Region does not exist");
                }
                print_json(&Destroyed { destroyed })
            },
        }
    }
}

fn open(options: RegionOptions) -> Result<SharedTableDirectory> {
    let path = options.path();
    SharedTableDirectory::open(options)
        .with_context(|| format!("Open region at {}", path.display()))
}

fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("Open {}", path.display()))?;
    let table: Table = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Parse table from {}", path.display()))?;
    info!(
        path = %path.display(),
        columns = table.column_count(),
        rows = table.row_count(),
        "Loaded table",
    );
    Ok(table)
}

fn ensure_finite(table: &Table) -> Result<()> {
    for column in table.columns() {
        let ColumnData::Float64(values) = &column.data else {
            continue;
        };
        if let Some(value) = values.iter().find(|v| !v.is_finite()) {
            bail!(
                "Column {:?} holds {value} which cannot be written as JSON",
                column.name,
            );
        }
    }
    Ok(())
}

fn map_column<M: NumericMap>(
    directory: &SharedTableDirectory,
    name: &str,
    column: &str,
    f: M,
) -> Result<()> {
    let outcome = directory
        .map_numeric_column(name, column, f)
        .with_context(|| format!("Map column {column:?} of table {name:?}"))?;

    match outcome {
        MapOutcome::Applied { rows } => info!(table = name, column, rows, "Mapped column"),
        MapOutcome::ColumnNotFound => warn!(table = name, column, "Column does not exist"),
        MapOutcome::NotNumeric => warn!(table = name, column, "Column is not numeric"),
    }

    print_json(&outcome)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Write output")?;
    writeln!(stdout)?;
    Ok(())
}
