//! Schema-driven table synchronization and duplicate-guarded bulk insert.

use crate::database::dataset::Dataset;
use crate::database::migration::ChangeState;
use crate::database::migration::ColumnTypeChange;
use crate::database::schema::infer_columns;
use crate::database::schema::ColumnSpec;
use crate::database::schema::SqlType;
use crate::database::schema::TableSchema;
use crate::database::statement;
use crate::database::store::Store;
use crate::database::store::StoreError;
use crate::database::value::Value;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// Schema statements that report failures as [`SyncError::Schema`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchemaOperation {
    CreateTable,
    AddColumn,
    DropColumn,
}

impl Display for SchemaOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SchemaOperation::CreateTable => "Create table",
            SchemaOperation::AddColumn => "Add column",
            SchemaOperation::DropColumn => "Drop column",
        })
    }
}

fn column_suffix(column: &Option<String>) -> String {
    column.as_ref().map(|column| format!(" column '{column}'")).unwrap_or_default()
}

/// Failures of engine operations. Every operation is attempted once.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Connect to '{path}' failed: {source}")]
    Connection { path: String, source: StoreError },

    #[error("{operation} failed on table '{table}'{}: {source}", column_suffix(.column))]
    Schema {
        operation: SchemaOperation,
        table: String,
        column: Option<String>,
        source: StoreError,
    },

    #[error(
        "Copying column '{}' of table '{}' into type {} failed, change stopped at '{}': {source}",
        .change.column, .change.table, .change.new_type, .change.state()
    )]
    TypeCoercion {
        change: ColumnTypeChange,
        source: StoreError,
    },

    #[error(
        "Changing type of column '{}' of table '{}' stopped at '{}': {source}",
        .change.column, .change.table, .change.state()
    )]
    TypeChangeInterrupted {
        change: ColumnTypeChange,
        source: StoreError,
    },

    #[error("Duplicate record in table '{table}' at {duplicate}")]
    DuplicateDetected { table: String, duplicate: Duplicate },

    #[error("Insert into '{table}' failed at row {row} after {inserted} rows were inserted: {source}")]
    InsertPartialFailure {
        table: String,
        inserted: usize,
        row: usize,
        source: StoreError,
    },

    #[error("Commit on table '{table}' failed: {source}")]
    Commit { table: String, source: StoreError },

    #[error("Query on table '{table}' failed: {source}")]
    Query { table: String, source: StoreError },

    #[error("Dataset for table '{table}' cannot be used: {reason}")]
    InvalidDataset { table: String, reason: String },
}

/// First dataset row whose key values already exist in the table.
#[derive(Clone, Debug, PartialEq)]
pub struct Duplicate {
    /// Row index within the dataset (0-based)
    pub row: usize,
    /// Key column names and the row's values for them
    pub keys: Vec<(String, Value)>,
}

impl Display for Duplicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self
            .keys
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "row {} ({keys})", self.row)
    }
}

/// How existing keys are looked up before an insert.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateProbe {
    /// One count query per dataset row, stopping at the first match
    #[default]
    PerRow,
    /// One query per chunk of rows, reporting the smallest matching row
    Batched,
}

/// Outcome of [`TableSyncEngine::sync_schema`].
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaSync {
    pub created: bool,
    pub added: Vec<ColumnSpec>,
}

/// Issues schema and data statements for one table against a borrowed store.
///
/// The engine never opens or closes the store and keeps no state of its own
/// between calls.
pub struct TableSyncEngine<'a, S: Store + ?Sized> {
    store: &'a mut S,
    probe: DuplicateProbe,
    batch_size: usize,
}

impl<'a, S: Store + ?Sized> TableSyncEngine<'a, S> {
    pub const DEFAULT_BATCH_SIZE: usize = 500;

    pub fn new(store: &'a mut S) -> Self {
        TableSyncEngine {
            store,
            probe: DuplicateProbe::default(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_probe(mut self, probe: DuplicateProbe, batch_size: usize) -> Self {
        self.probe = probe;
        self.batch_size = batch_size.max(1);
        self
    }

    /// Runs a schema statement and commits it.
    fn schema_statement(
        &mut self,
        operation: SchemaOperation,
        table: &str,
        column: Option<&str>,
        sql: &str,
    ) -> Result<(), SyncError> {
        let result = self.store.execute(sql, &[]).and_then(|_| self.store.commit());
        result.map_err(|source| {
            tracing::warn!(%operation, table, column, "schema statement failed: {source}");
            SyncError::Schema {
                operation,
                table: table.to_owned(),
                column: column.map(str::to_owned),
                source,
            }
        })
    }

    pub fn create_table(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<(), SyncError> {
        let sql = statement::create_table(table, columns);
        self.schema_statement(SchemaOperation::CreateTable, table, None, &sql)?;
        tracing::info!("table {table} created with {} columns", columns.len());
        Ok(())
    }

    /// Appends a column; the store decides nothing about its position but the end.
    pub fn add_column(&mut self, table: &str, column: &str, sql_type: SqlType) -> Result<(), SyncError> {
        let sql = statement::add_column(table, column, sql_type);
        self.schema_statement(SchemaOperation::AddColumn, table, Some(column), &sql)?;
        tracing::info!("added column {column} {sql_type} to {table}");
        Ok(())
    }

    pub fn drop_column(&mut self, table: &str, column: &str) -> Result<(), SyncError> {
        let sql = statement::drop_column(table, column);
        self.schema_statement(SchemaOperation::DropColumn, table, Some(column), &sql)?;
        tracing::info!("deleted column {column} from {table}");
        Ok(())
    }

    /// Changes a column's type through a temporary column.
    ///
    /// The four steps are committed one by one. On failure the returned error
    /// carries the interrupted [`ColumnTypeChange`], which can be passed to
    /// [`Self::resume_column_type_change`] or [`Self::abandon_column_type_change`].
    pub fn change_column_type(&mut self, table: &str, column: &str, new_type: SqlType) -> Result<(), SyncError> {
        let mut change = ColumnTypeChange::new(table, column, new_type);
        self.resume_column_type_change(&mut change)
    }

    /// Continues a change from the last state it reached.
    pub fn resume_column_type_change(&mut self, change: &mut ColumnTypeChange) -> Result<(), SyncError> {
        loop {
            let state = change.state();
            match change.advance(&mut *self.store) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(source) => {
                    tracing::warn!(
                        table = %change.table,
                        column = %change.column,
                        state = %state,
                        "column type change interrupted: {source}"
                    );
                    let change = change.clone();
                    return Err(if state == ChangeState::TempAdded {
                        SyncError::TypeCoercion { change, source }
                    } else {
                        SyncError::TypeChangeInterrupted { change, source }
                    });
                }
            }
        }
        tracing::info!("changed data type of {}.{} to {}", change.table, change.column, change.new_type);
        Ok(())
    }

    /// Drops the temporary column of an interrupted change.
    pub fn abandon_column_type_change(&mut self, change: &mut ColumnTypeChange) -> Result<(), SyncError> {
        change.abandon(&mut *self.store).map_err(|source| SyncError::TypeChangeInterrupted {
            change: change.clone(),
            source,
        })
    }

    /// Reads a table's columns from the information schema, `None` if the table is absent.
    pub fn table_schema(&mut self, table: &str) -> Result<Option<TableSchema>, SyncError> {
        let query_error = |source| SyncError::Query {
            table: table.to_owned(),
            source,
        };
        let rows = self
            .store
            .query(statement::table_columns(), &[Value::from(table)])
            .map_err(query_error)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let columns = rows
            .into_iter()
            .map(|row| match (row.first(), row.get(1)) {
                (Some(Value::Text(name)), Some(Value::Text(kind))) => Ok(ColumnSpec::new(
                    name,
                    SqlType::parse(kind).unwrap_or_else(|_| SqlType::from_type_name(kind)),
                )),
                _ => Err(query_error(StoreError::Rejected(format!(
                    "unexpected information schema row {row:?}"
                )))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(TableSchema {
            name: table.to_owned(),
            columns,
        }))
    }

    /// Adds the dataset columns the table does not have yet, in dataset order.
    pub fn add_missing_columns(&mut self, schema: &TableSchema, dataset: &Dataset) -> Result<Vec<ColumnSpec>, SyncError> {
        let mut added = Vec::new();
        for column in infer_columns(dataset) {
            if schema.column(&column.name).is_none() {
                self.add_column(&schema.name, &column.name, column.sql_type)?;
                added.push(column);
            }
        }
        Ok(added)
    }

    /// Creates the table from the dataset when absent, otherwise extends it
    /// with missing columns. Existing columns are never dropped or retyped.
    pub fn sync_schema(&mut self, table: &str, dataset: &Dataset) -> Result<SchemaSync, SyncError> {
        match self.table_schema(table)? {
            None => {
                self.create_table(table, &infer_columns(dataset))?;
                Ok(SchemaSync {
                    created: true,
                    added: Vec::new(),
                })
            }
            Some(schema) => Ok(SchemaSync {
                created: false,
                added: self.add_missing_columns(&schema, dataset)?,
            }),
        }
    }

    fn key_indexes(&self, table: &str, dataset: &Dataset, keys: &[&str]) -> Result<Vec<usize>, SyncError> {
        if keys.is_empty() {
            return Err(SyncError::InvalidDataset {
                table: table.to_owned(),
                reason: "no key columns given".to_owned(),
            });
        }
        keys.iter()
            .map(|key| {
                dataset.column_index(key).ok_or_else(|| SyncError::InvalidDataset {
                    table: table.to_owned(),
                    reason: format!("key column '{key}' is not a dataset column"),
                })
            })
            .collect()
    }

    /// Returns the first dataset row whose key values all equal those of an
    /// existing table row. Null keys never match.
    pub fn find_duplicate(&mut self, table: &str, dataset: &Dataset, keys: &[&str]) -> Result<Option<Duplicate>, SyncError> {
        let indexes = self.key_indexes(table, dataset, keys)?;
        let row = match self.probe {
            DuplicateProbe::PerRow => self.probe_per_row(table, dataset, keys, &indexes)?,
            DuplicateProbe::Batched => self.probe_batched(table, dataset, keys, &indexes)?,
        };
        Ok(row.map(|row| Duplicate {
            row,
            keys: keys
                .iter()
                .zip(&indexes)
                .map(|(key, index)| (key.to_string(), dataset.rows()[row][*index].clone()))
                .collect(),
        }))
    }

    fn probe_per_row(&mut self, table: &str, dataset: &Dataset, keys: &[&str], indexes: &[usize]) -> Result<Option<usize>, SyncError> {
        let sql = statement::count_matching(table, keys);
        for (row, values) in dataset.rows().iter().enumerate() {
            let params: Vec<Value> = indexes.iter().map(|index| values[*index].clone()).collect();
            let result = self.store.query(&sql, &params).map_err(|source| SyncError::Query {
                table: table.to_owned(),
                source,
            })?;
            match result.first().and_then(|record| record.first()) {
                Some(Value::BigInt(count)) if *count > 0 => return Ok(Some(row)),
                Some(Value::BigInt(_)) => (),
                other => {
                    return Err(SyncError::Query {
                        table: table.to_owned(),
                        source: StoreError::Rejected(format!("unexpected count result {other:?}")),
                    })
                }
            }
        }
        Ok(None)
    }

    fn probe_batched(&mut self, table: &str, dataset: &Dataset, keys: &[&str], indexes: &[usize]) -> Result<Option<usize>, SyncError> {
        let rows: Vec<usize> = (0..dataset.len()).collect();
        for chunk in rows.chunks(self.batch_size) {
            let sql = statement::first_matching_row(table, keys, chunk);
            let params: Vec<Value> = chunk
                .iter()
                .flat_map(|row| indexes.iter().map(move |index| dataset.rows()[*row][*index].clone()))
                .collect();
            let result = self.store.query(&sql, &params).map_err(|source| SyncError::Query {
                table: table.to_owned(),
                source,
            })?;
            match result.first().and_then(|record| record.first()) {
                Some(Value::BigInt(row)) => return Ok(Some(*row as usize)),
                Some(Value::Null) | None => (),
                other => {
                    return Err(SyncError::Query {
                        table: table.to_owned(),
                        source: StoreError::Rejected(format!("unexpected probe result {other:?}")),
                    })
                }
            }
        }
        Ok(None)
    }

    /// Inserts every dataset row unless any row's keys already exist.
    ///
    /// A duplicate aborts before anything is written. Rows land one by one in
    /// dataset order, so a failing row leaves the rows before it in place.
    /// Returns the number of rows inserted.
    pub fn insert_if_no_duplicates(&mut self, table: &str, dataset: &Dataset, keys: &[&str]) -> Result<usize, SyncError> {
        if let Some(duplicate) = self.find_duplicate(table, dataset, keys)? {
            tracing::warn!("duplicate records detected in {table} at {duplicate}, skipping insertion");
            return Err(SyncError::DuplicateDetected {
                table: table.to_owned(),
                duplicate,
            });
        }

        let sql = statement::insert(table, &dataset.column_names());
        let inserted = self.store.execute_each(&sql, dataset.rows()).map_err(|error| {
            tracing::warn!("insert into {table} failed after {} rows: {}", error.completed, error.source);
            SyncError::InsertPartialFailure {
                table: table.to_owned(),
                inserted: error.completed,
                row: error.completed,
                source: error.source,
            }
        })?;
        self.store.commit().map_err(|source| SyncError::Commit {
            table: table.to_owned(),
            source,
        })?;
        tracing::info!("inserted {inserted} rows into {table}");
        Ok(inserted)
    }
}
