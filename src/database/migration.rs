//! Column type change as an explicit, resumable sequence of statements.
//!
//! Each step is committed on its own, so an interrupted change leaves the
//! table in an intermediate state. The change value records the last state
//! reached; [`ColumnTypeChange::advance`] continues from there and
//! [`ColumnTypeChange::abandon`] drops the temporary column while the
//! original column still exists.

use crate::database::schema::SqlType;
use crate::database::statement;
use crate::database::store::Store;
use crate::database::store::StoreError;
use std::fmt::Display;

/// States of a column type change, in execution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeState {
    /// Nothing issued yet
    Start,
    /// Temporary column with the new type exists
    TempAdded,
    /// Values copied into the temporary column
    Copied,
    /// Original column dropped, temporary column still carries its temporary name
    OldDropped,
    /// Temporary column renamed to the original name
    Renamed,
}

impl ChangeState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChangeState::Start => "start",
            ChangeState::TempAdded => "temp column added",
            ChangeState::Copied => "values copied",
            ChangeState::OldDropped => "old column dropped",
            ChangeState::Renamed => "renamed",
        }
    }
}

impl Display for ChangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of changing one column's type.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnTypeChange {
    pub table: String,
    pub column: String,
    pub temp_column: String,
    pub new_type: SqlType,
    state: ChangeState,
}

impl ColumnTypeChange {
    pub fn new(table: &str, column: &str, new_type: SqlType) -> Self {
        ColumnTypeChange {
            table: table.to_owned(),
            column: column.to_owned(),
            temp_column: format!("{column}_temp"),
            new_type,
            state: ChangeState::Start,
        }
    }

    pub fn state(&self) -> ChangeState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ChangeState::Renamed
    }

    /// Whether the original column is still present, so the change can be abandoned.
    pub fn can_abandon(&self) -> bool {
        matches!(self.state, ChangeState::TempAdded | ChangeState::Copied)
    }

    /// Statement leading out of the current state, `None` once renamed.
    fn next_statement(&self) -> Option<String> {
        match self.state {
            ChangeState::Start => Some(statement::add_column(&self.table, &self.temp_column, self.new_type)),
            ChangeState::TempAdded => Some(statement::copy_column(&self.table, &self.column, &self.temp_column)),
            ChangeState::Copied => Some(statement::drop_column(&self.table, &self.column)),
            ChangeState::OldDropped => Some(statement::rename_column(&self.table, &self.temp_column, &self.column)),
            ChangeState::Renamed => None,
        }
    }

    const fn successor(state: ChangeState) -> ChangeState {
        match state {
            ChangeState::Start => ChangeState::TempAdded,
            ChangeState::TempAdded => ChangeState::Copied,
            ChangeState::Copied => ChangeState::OldDropped,
            ChangeState::OldDropped | ChangeState::Renamed => ChangeState::Renamed,
        }
    }

    /// Issues and commits the next step. Returns `Ok(false)` when already complete.
    ///
    /// On failure the state is left where it was, so calling again re-attempts
    /// the same step.
    pub fn advance<S: Store + ?Sized>(&mut self, store: &mut S) -> Result<bool, StoreError> {
        let Some(sql) = self.next_statement() else {
            return Ok(false);
        };
        store.execute(&sql, &[])?;
        store.commit()?;
        self.state = Self::successor(self.state);
        tracing::debug!(table = %self.table, column = %self.column, state = %self.state, "column type change advanced");
        Ok(true)
    }

    /// Compensating action: drops the temporary column and returns to `Start`.
    pub fn abandon<S: Store + ?Sized>(&mut self, store: &mut S) -> Result<(), StoreError> {
        if !self.can_abandon() {
            return Err(StoreError::Rejected(format!(
                "cannot abandon change of {}.{} in state '{}'",
                self.table, self.column, self.state
            )));
        }
        store.execute(&statement::drop_column(&self.table, &self.temp_column), &[])?;
        store.commit()?;
        self.state = ChangeState::Start;
        tracing::info!(table = %self.table, column = %self.column, "abandoned column type change");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::value::Value;

    #[derive(Default)]
    struct RecordingStore {
        statements: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl Store for RecordingStore {
        fn execute(&mut self, sql: &str, _: &[Value]) -> Result<usize, StoreError> {
            if self.fail_on.map(|prefix| sql.starts_with(prefix)).unwrap_or(false) {
                return Err(StoreError::Rejected(format!("rejected: {sql}")));
            }
            self.statements.push(sql.to_owned());
            Ok(0)
        }

        fn query(&mut self, _: &str, _: &[Value]) -> Result<Vec<Vec<Value>>, StoreError> {
            Ok(Vec::new())
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn walks_every_state_in_order() {
        let mut store = RecordingStore::default();
        let mut change = ColumnTypeChange::new("Sales", "amount", SqlType::Text);
        let mut states = vec![change.state()];
        while change.advance(&mut store).unwrap() {
            states.push(change.state());
        }

        assert_eq!(states, vec![
            ChangeState::Start,
            ChangeState::TempAdded,
            ChangeState::Copied,
            ChangeState::OldDropped,
            ChangeState::Renamed,
        ]);
        assert_eq!(store.statements, vec![
            "ALTER TABLE \"Sales\" ADD COLUMN \"amount_temp\" TEXT",
            "UPDATE \"Sales\" SET \"amount_temp\" = \"amount\"",
            "ALTER TABLE \"Sales\" DROP COLUMN \"amount\"",
            "ALTER TABLE \"Sales\" RENAME COLUMN \"amount_temp\" TO \"amount\"",
        ]);
        assert!(change.is_complete());
    }

    #[test]
    fn failed_step_keeps_state_and_can_be_retried() {
        let mut store = RecordingStore {
            fail_on: Some("ALTER TABLE \"Sales\" RENAME"),
            ..Default::default()
        };
        let mut change = ColumnTypeChange::new("Sales", "amount", SqlType::Text);
        for _ in 0..3 {
            change.advance(&mut store).unwrap();
        }
        assert!(change.advance(&mut store).is_err());
        assert_eq!(change.state(), ChangeState::OldDropped);
        assert!(!change.can_abandon());
        assert!(change.abandon(&mut store).is_err());

        store.fail_on = None;
        assert!(change.advance(&mut store).unwrap());
        assert!(change.is_complete());
        assert!(!change.advance(&mut store).unwrap());
    }

    #[test]
    fn abandon_drops_temp_column() {
        let mut store = RecordingStore {
            fail_on: Some("UPDATE"),
            ..Default::default()
        };
        let mut change = ColumnTypeChange::new("Sales", "market", SqlType::Integer);
        change.advance(&mut store).unwrap();
        assert!(change.advance(&mut store).is_err());
        assert_eq!(change.state(), ChangeState::TempAdded);

        change.abandon(&mut store).unwrap();
        assert_eq!(change.state(), ChangeState::Start);
        assert_eq!(
            store.statements.last().map(String::as_str),
            Some("ALTER TABLE \"Sales\" DROP COLUMN \"market_temp\"")
        );
    }
}
