//! One synchronization job: read a worksheet, align the table, append the rows.
use crate::config::SyncConfig;
use crate::database::engine::SyncError;
use crate::database::engine::TableSyncEngine;
use crate::database::schema::infer_columns;
use crate::database::schema::ColumnSpec;
use crate::database::store::DuckDbStore;
use crate::spreadsheet;
use crate::spreadsheet::criteria::Criteria;
use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

/// What a finished job changed.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncReport {
    pub table: String,
    pub created: bool,
    pub added_columns: Vec<ColumnSpec>,
    pub rows_inserted: usize,
}

/// Runs the job described by the configuration.
///
/// The table is created or extended first, then the rows are inserted only
/// when none of their keys is already present. Schema changes stay applied
/// when the insert is refused.
pub fn run(config: &SyncConfig) -> Result<SyncReport> {
    let criteria = Criteria::try_from(&config.sheet).context("Invalid [sheet] configuration")?;
    let dataset = spreadsheet::read_dataset(&config.workbook, &criteria)
        .with_context(|| format!("Failed to read workbook {}", config.workbook))?;
    tracing::info!(rows = dataset.len(), columns = dataset.columns().len(), "read dataset from {}", config.workbook);

    let mut store = DuckDbStore::open(&config.database).map_err(|source| SyncError::Connection {
        path: config.database.display().to_string(),
        source,
    })?;

    let table = config.table.as_str();
    let keys = config.keys();
    let (created, added_columns, rows_inserted) = {
        let mut engine = TableSyncEngine::new(&mut store).with_probe(config.duplicate_probe, config.probe_batch_size);
        let (created, added_columns) = match engine.table_schema(table)? {
            None if config.create_table => {
                engine
                    .create_table(table, &infer_columns(&dataset))
                    .with_context(|| format!("Failed to create table {table}"))?;
                (true, Vec::new())
            }
            None => bail!("Table {table} does not exist and create_table is disabled"),
            Some(schema) if config.add_missing_columns => {
                let added = engine
                    .add_missing_columns(&schema, &dataset)
                    .with_context(|| format!("Failed to extend table {table}"))?;
                (false, added)
            }
            Some(schema) => {
                let missing: Vec<&str> = dataset
                    .column_names()
                    .into_iter()
                    .filter(|name| schema.column(name).is_none())
                    .collect();
                if !missing.is_empty() {
                    bail!("Table {table} lacks columns {missing:?} and add_missing_columns is disabled");
                }
                (false, Vec::new())
            }
        };
        let rows_inserted = engine
            .insert_if_no_duplicates(table, &dataset, &keys)
            .with_context(|| format!("Failed to insert rows into {table}"))?;
        (created, added_columns, rows_inserted)
    };

    store
        .close()
        .with_context(|| format!("Failed to close database {}", config.database.display()))?;
    tracing::info!(table, created, added = added_columns.len(), rows_inserted, "synchronization finished");
    Ok(SyncReport {
        table: table.to_owned(),
        created,
        added_columns,
        rows_inserted,
    })
}
