use crate::error::SheetSyncError;
use thiserror::Error;

/// Errors related to column type parsing and validation.
#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("Invalid column type '{0}'")]
    TypeError(String),

    #[error("Invalid SQL type '{0}'")]
    SqlTypeError(String),
}

/// Declared value type of a dataset column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// Boolean values (true/false)
    Boolean,
    /// 64-bit signed integers
    BigInt,
    /// Double-precision floating point numbers
    Double,
    /// Date and time with microsecond precision
    Timestamp,
    /// Variable-length strings
    Text,
}

/// Represents a dataset column with name and declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Column name (from header row or generated)
    pub name: String,
    /// Declared column type
    pub kind: ColumnType,
}

impl Column {
    pub fn new(name: &str, kind: ColumnType) -> Self {
        Column {
            name: name.to_owned(),
            kind,
        }
    }
}

impl ColumnType {
    /// Returns the type name used for SQL type inference.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "bool",
            ColumnType::BigInt => "int64",
            ColumnType::Double => "float64",
            ColumnType::Timestamp => "datetime",
            ColumnType::Text => "text",
        }
    }

    /// Parses a column type from a string representation.
    /// Supports various aliases for each type.
    pub fn parse(name: &str) -> Result<Self, SheetSyncError> {
        match name.to_ascii_uppercase().as_str() {
            "BOOL" | "BOOLEAN" => Ok(Self::Boolean),
            "INT" | "INT64" | "BIGINT" | "INTEGER" => Ok(Self::BigInt),
            "FLOAT" | "FLOAT64" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Ok(Self::Double),
            "TEXT" | "STRING" | "VARCHAR" => Ok(Self::Text),
            "DATETIME" | "TIMESTAMP" => Ok(Self::Timestamp),
            _ => Err(ColumnError::TypeError(name.to_string()))?,
        }
    }

    /// Detects the column type from the kinds of its non-null values.
    ///
    /// Booleans and integers only survive when the column has no nulls,
    /// numbers widen to double, and anything mixed or empty is text.
    pub(crate) fn detect(types: &[ColumnType], has_nulls: bool) -> ColumnType {
        if types.is_empty() {
            ColumnType::Text
        } else if !has_nulls && types.iter().all(|kind| kind.is_boolean()) {
            ColumnType::Boolean
        } else if !has_nulls && types.iter().all(|kind| kind.is_int()) {
            ColumnType::BigInt
        } else if types.iter().all(|kind| kind.is_float()) {
            ColumnType::Double
        } else if types.iter().all(|kind| kind.is_datetime()) {
            ColumnType::Timestamp
        } else {
            ColumnType::Text
        }
    }

    #[inline]
    pub(crate) fn is_boolean(&self) -> bool {
        matches!(self, ColumnType::Boolean)
    }

    #[inline]
    pub(crate) fn is_int(&self) -> bool {
        matches!(self, ColumnType::BigInt)
    }

    /// Returns true if this column type represents numeric values (integer or floating point).
    #[inline]
    pub(crate) fn is_float(&self) -> bool {
        matches!(self, ColumnType::BigInt | ColumnType::Double)
    }

    #[inline]
    pub(crate) fn is_datetime(&self) -> bool {
        matches!(self, ColumnType::Timestamp)
    }
}
