use crate::database::column::Column;
use crate::database::column::ColumnType;
use crate::database::value::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised when a dataset violates its shape invariants.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset has no columns")]
    NoColumns,

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Row {row} has {actual} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Row {row} column '{column}' holds a {actual} value, expected {expected}")]
    ValueType {
        row: usize,
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Ordered named columns with a declared type each, plus rows of values.
///
/// Every row carries exactly one value per column, and every value is
/// either null or of its column's declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new<R>(columns: Vec<Column>, rows: Vec<R>) -> Result<Self, DatasetError>
    where
        R: Into<Vec<Value>>,
    {
        if columns.is_empty() {
            return Err(DatasetError::NoColumns);
        }
        let mut names = HashSet::new();
        for column in &columns {
            if !names.insert(column.name.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.name.to_owned()));
            }
        }

        let rows: Vec<Vec<Value>> = rows.into_iter().map(Into::into).collect();
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DatasetError::RowWidth {
                    row: index,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            for (column, value) in columns.iter().zip(row) {
                if let Some(kind) = value.kind().filter(|kind| *kind != column.kind) {
                    return Err(DatasetError::ValueType {
                        row: index,
                        column: column.name.to_owned(),
                        expected: column.kind.as_str(),
                        actual: kind.as_str(),
                    });
                }
            }
        }

        Ok(Dataset { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.iter().find(|column| column.name == name).map(|column| column.kind)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("market", ColumnType::Text),
            Column::new("amount", ColumnType::Double),
        ]
    }

    #[test]
    fn accepts_nulls_and_declared_types() {
        let dataset = Dataset::new(columns(), vec![
            vec![Value::from("NY"), Value::from(1.5)],
            vec![Value::Null, Value::Null],
        ])
        .unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.column_index("amount"), Some(1));
        assert_eq!(dataset.column_type("market"), Some(ColumnType::Text));
        assert_eq!(dataset.column_names(), vec!["market", "amount"]);
    }

    #[test]
    fn rejects_ragged_rows() {
        let result = Dataset::new(columns(), vec![vec![Value::from("NY")]]);
        assert!(matches!(result, Err(DatasetError::RowWidth { row: 0, expected: 2, actual: 1 })));
    }

    #[test]
    fn rejects_mistyped_values() {
        let result = Dataset::new(columns(), vec![vec![Value::from("NY"), Value::from("100")]]);
        assert!(matches!(result, Err(DatasetError::ValueType { row: 0, .. })));
    }

    #[test]
    fn rejects_shapeless_datasets() {
        assert!(matches!(
            Dataset::new(Vec::new(), Vec::<Vec<Value>>::new()),
            Err(DatasetError::NoColumns)
        ));
        assert!(matches!(
            Dataset::new(
                vec![Column::new("a", ColumnType::Text), Column::new("a", ColumnType::Text)],
                Vec::<Vec<Value>>::new()
            ),
            Err(DatasetError::DuplicateColumn(_))
        ));
    }
}
