//! Job configuration loaded from a TOML file.
//!
//! ```toml
//! database = "warehouse.duckdb"
//! workbook = "reports/sales.xlsx"
//! table = "sales"
//! key_columns = ["date", "market"]
//! duplicate_probe = "batched"
//!
//! [sheet]
//! name = "Sales*"
//! range = "A1:E"
//! nulls = ["", "N/A"]
//! ```
use crate::database::engine::DuplicateProbe;
use crate::database::engine::TableSyncEngine;
use crate::error::ResultMessage;
use crate::error::SheetSyncError;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::range::Range;
use figment::providers::Format;
use figment::providers::Toml;
use figment::Figment;
use glob::Pattern;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

/// One workbook-to-table synchronization job.
#[derive(Clone, Debug, Deserialize)]
pub struct SyncConfig {
    /// DuckDB database file, created when missing.
    pub database: PathBuf,

    /// Local path or remote URL of the workbook.
    pub workbook: String,

    /// Target table.
    pub table: String,

    /// Columns whose values identify a row in the target table.
    pub key_columns: Vec<String>,

    /// Create the table from the dataset when it does not exist.
    #[serde(default = "default_true")]
    pub create_table: bool,

    /// Add dataset columns missing from an existing table.
    #[serde(default = "default_true")]
    pub add_missing_columns: bool,

    #[serde(default)]
    pub duplicate_probe: DuplicateProbe,

    /// Rows per query when `duplicate_probe = "batched"`.
    #[serde(default = "default_probe_batch_size")]
    pub probe_batch_size: usize,

    #[serde(default)]
    pub sheet: SheetConfig,
}

/// The `[sheet]` section: which cells to read and how.
#[derive(Clone, Debug, Deserialize)]
pub struct SheetConfig {
    /// Glob pattern over sheet names; the first sheet when absent.
    pub name: Option<String>,

    /// Cell range such as `A1:E100`, `B:D` or `3:`.
    pub range: Option<String>,

    #[serde(default = "default_true")]
    pub header: bool,

    pub rows_limit: Option<usize>,

    /// Cell texts read as null; only the empty string when absent.
    pub nulls: Option<Vec<String>>,

    #[serde(default)]
    pub error_as_null: bool,

    #[serde(default)]
    pub skip_empty_rows: bool,
}

impl Default for SheetConfig {
    fn default() -> Self {
        SheetConfig {
            name: None,
            range: None,
            header: true,
            rows_limit: None,
            nulls: None,
            error_as_null: false,
            skip_empty_rows: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_probe_batch_size() -> usize {
    TableSyncEngine::<crate::database::store::DuckDbStore>::DEFAULT_BATCH_SIZE
}

impl SyncConfig {
    /// Reads the job from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SheetSyncError> {
        let path = path.as_ref();
        let config: SyncConfig = Figment::from(Toml::file(path))
            .extract()
            .map_err(Box::new)
            .map_err(SheetSyncError::from)
            .with_prefix(&path.display().to_string())?;
        tracing::debug!(table = %config.table, workbook = %config.workbook, "loaded sync configuration");
        Ok(config)
    }

    /// Key column names as borrowed slices for the engine.
    pub fn keys(&self) -> Vec<&str> {
        self.key_columns.iter().map(String::as_str).collect()
    }
}

impl TryFrom<&SheetConfig> for Criteria {
    type Error = SheetSyncError;

    fn try_from(config: &SheetConfig) -> Result<Self, Self::Error> {
        let sheet_name_pattern = config.name.as_deref().map(Pattern::new).transpose()?;
        let range = config.range.as_deref().map(Range::try_from).transpose()?;
        let nulls = match &config.nulls {
            Some(nulls) => nulls.iter().cloned().collect(),
            None => HashSet::from([String::new()]),
        };
        Ok(Criteria {
            sheet_name_pattern,
            range,
            header: config.header,
            rows_limit: config.rows_limit,
            nulls,
            error_as_null: config.error_as_null,
            skip_empty_rows: config.skip_empty_rows,
        })
    }
}
