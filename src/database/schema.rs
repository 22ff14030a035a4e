use crate::database::column::ColumnError;
use crate::database::dataset::Dataset;
use crate::error::SheetSyncError;
use std::fmt::Display;

/// Column types the engine issues in DDL statements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Double,
    DateTime,
    Text,
}

impl SqlType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Double => "DOUBLE",
            SqlType::DateTime => "DATETIME",
            SqlType::Text => "TEXT",
        }
    }

    /// Maps a declared value type name to a SQL type.
    ///
    /// First match wins: "int", then "float", then "datetime", otherwise text.
    pub fn from_type_name(type_name: &str) -> SqlType {
        let type_name = type_name.to_ascii_lowercase();
        if type_name.contains("int") {
            SqlType::Integer
        } else if type_name.contains("float") {
            SqlType::Double
        } else if type_name.contains("datetime") {
            SqlType::DateTime
        } else {
            SqlType::Text
        }
    }

    /// Parses a SQL type name as written by callers or reported by the store.
    pub fn parse(name: &str) -> Result<Self, SheetSyncError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" | "INT4" | "BIGINT" | "INT8" | "SMALLINT" | "TINYINT" => Ok(Self::Integer),
            "DOUBLE" | "FLOAT" | "FLOAT8" | "REAL" => Ok(Self::Double),
            "DATETIME" | "TIMESTAMP" => Ok(Self::DateTime),
            "TEXT" | "VARCHAR" | "STRING" => Ok(Self::Text),
            _ => Err(ColumnError::SqlTypeError(name.to_string()))?,
        }
    }
}

impl Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column definition of a store table.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
}

impl ColumnSpec {
    pub fn new(name: &str, sql_type: SqlType) -> Self {
        ColumnSpec {
            name: name.to_owned(),
            sql_type,
        }
    }
}

/// Ordered column definitions of a named table.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

/// Derives one column definition per dataset column, in dataset order.
pub fn infer_columns(dataset: &Dataset) -> Vec<ColumnSpec> {
    dataset
        .columns()
        .iter()
        .map(|column| ColumnSpec::new(&column.name, SqlType::from_type_name(column.kind.as_str())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::column::{Column, ColumnType};
    use crate::database::value::Value;

    #[test]
    fn type_name_precedence() {
        assert_eq!(SqlType::from_type_name("int64"), SqlType::Integer);
        assert_eq!(SqlType::from_type_name("uint8"), SqlType::Integer);
        assert_eq!(SqlType::from_type_name("float32"), SqlType::Double);
        assert_eq!(SqlType::from_type_name("datetime"), SqlType::DateTime);
        assert_eq!(SqlType::from_type_name("bool"), SqlType::Text);
        assert_eq!(SqlType::from_type_name("object"), SqlType::Text);
        // "int" is checked before "datetime"
        assert_eq!(SqlType::from_type_name("datetime_interval"), SqlType::Integer);
    }

    #[test]
    fn infer_preserves_order_and_names() {
        let dataset = Dataset::new(
            vec![
                Column::new("units", ColumnType::BigInt),
                Column::new("unit price", ColumnType::Double),
                Column::new("market", ColumnType::Text),
                Column::new("at", ColumnType::Timestamp),
                Column::new("paid", ColumnType::Boolean),
            ],
            Vec::<Vec<Value>>::new(),
        )
        .unwrap();

        assert_eq!(
            infer_columns(&dataset),
            vec![
                ColumnSpec::new("units", SqlType::Integer),
                ColumnSpec::new("unit price", SqlType::Double),
                ColumnSpec::new("market", SqlType::Text),
                ColumnSpec::new("at", SqlType::DateTime),
                ColumnSpec::new("paid", SqlType::Text),
            ]
        );
    }

    #[test]
    fn parse_store_type_names() {
        assert_eq!(SqlType::parse("VARCHAR").unwrap(), SqlType::Text);
        assert_eq!(SqlType::parse("timestamp").unwrap(), SqlType::DateTime);
        assert_eq!(SqlType::parse("BIGINT").unwrap(), SqlType::Integer);
        assert!(SqlType::parse("BLOB").is_err());
    }
}
