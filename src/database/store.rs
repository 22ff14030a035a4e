//! The SQL store seam and its DuckDB implementation.

use crate::database::value::Value;
use duckdb::params_from_iter;
use duckdb::types::Value as DuckValue;
use duckdb::Connection;
use std::path::Path;
use thiserror::Error;

/// Errors reported by a store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    DuckDBError(#[from] duckdb::Error),

    /// Statement rejected by a store that is not backed by DuckDB
    #[error("{0}")]
    Rejected(String),
}

/// A statement template that failed part way through its rows.
#[derive(Error, Debug)]
#[error("failed after {completed} rows: {source}")]
pub struct BatchError {
    /// Rows executed successfully before the failure
    pub completed: usize,
    pub source: StoreError,
}

/// A SQL-capable tabular store reached over a single connection.
///
/// Values are always bound as positional parameters.
pub trait Store {
    /// Executes one statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, StoreError>;

    /// Runs a query and returns every row it yields.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>, StoreError>;

    /// Executes one statement template once per parameter row, in order,
    /// stopping at the first failure.
    fn execute_each(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<usize, BatchError> {
        for (completed, params) in rows.iter().enumerate() {
            self.execute(sql, params)
                .map_err(|source| BatchError { completed, source })?;
        }
        Ok(rows.len())
    }

    /// Makes the work issued so far durable.
    fn commit(&mut self) -> Result<(), StoreError>;
}

/// DuckDB database file (or in-memory database) behind one connection.
///
/// The connection is opened once and released exactly once, either through
/// [`DuckDbStore::close`] or on drop.
pub struct DuckDbStore {
    path: String,
    connection: Connection,
}

impl DuckDbStore {
    /// Opens the database file, creating it when it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("database {} does not exist, creating a new one", path.display());
        }
        let connection = Connection::open(path)?;
        tracing::info!("connected to database {}", path.display());
        Ok(DuckDbStore {
            path: path.display().to_string(),
            connection,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(DuckDbStore {
            path: ":memory:".to_owned(),
            connection: Connection::open_in_memory()?,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn close(self) -> Result<(), StoreError> {
        let path = self.path;
        self.connection.close().map_err(|(_, e)| e)?;
        tracing::info!("database connection to {path} closed");
        Ok(())
    }
}

fn parameters(params: &[Value]) -> impl Iterator<Item = DuckValue> + '_ {
    params.iter().map(Value::to_parameter)
}

impl Store for DuckDbStore {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, StoreError> {
        tracing::debug!(sql, "execute");
        let mut statement = self.connection.prepare(sql)?;
        Ok(statement.execute(params_from_iter(parameters(params)))?)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>, StoreError> {
        tracing::debug!(sql, "query");
        let mut statement = self.connection.prepare(sql)?;
        let mut rows = statement.query(params_from_iter(parameters(params)))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let width = row.as_ref().column_count();
            let record = (0..width)
                .map(|index| row.get::<_, DuckValue>(index).map(Value::from))
                .collect::<Result<Vec<_>, _>>()?;
            records.push(record);
        }
        Ok(records)
    }

    fn execute_each(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<usize, BatchError> {
        tracing::debug!(sql, rows = rows.len(), "execute each");
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|error| BatchError { completed: 0, source: error.into() })?;
        for (completed, params) in rows.iter().enumerate() {
            statement
                .execute(params_from_iter(parameters(params)))
                .map_err(|error| BatchError { completed, source: error.into() })?;
        }
        Ok(rows.len())
    }

    /// Statements run in auto-commit mode, so there is nothing pending.
    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
