//! # Sheet Sync
//!
//! Loads one worksheet of an Excel workbook into a DuckDB table, keeping the
//! table schema in step with the sheet and refusing rows that already exist.
//!
//! ## Features
//!
//! - **Workbook reading**: `.xlsx`, `.xlsm` and `.xlam` files, local or fetched
//!   over HTTP(S) / S3 through DuckDB's `read_blob`
//! - **Typed datasets**: per-column detection of boolean, integer, double,
//!   timestamp and text values, with configurable null literals
//! - **Schema synchronization**: create missing tables, add missing columns,
//!   drop columns and change a column's type through a resumable sequence of
//!   steps
//! - **Duplicate-free inserts**: key columns are probed row by row or in
//!   batches before any row is written
//!
//! ## Usage
//!
//! ```no_run
//! use sheet_sync::config::SyncConfig;
//!
//! let config = SyncConfig::load("sync.toml")?;
//! let report = sheet_sync::sync::run(&config)?;
//! println!("{} rows inserted into {}", report.rows_inserted, report.table);
//! # Ok::<(), anyhow::Error>(())
//! ```
pub mod config;
pub mod database;
pub mod error;
mod helpers;
pub mod spreadsheet;
pub mod sync;

pub use crate::config::SyncConfig;
pub use crate::database::engine::DuplicateProbe;
pub use crate::database::engine::SyncError;
pub use crate::database::engine::TableSyncEngine;
pub use crate::database::store::DuckDbStore;
pub use crate::database::store::Store;
pub use crate::error::SheetSyncError;
pub use crate::sync::SyncReport;
