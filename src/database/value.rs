use crate::database::column::ColumnType;
use chrono::DateTime;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use duckdb::types::TimeUnit;
use duckdb::types::Value as DuckValue;
use std::fmt::Display;

/// Format used when a timestamp crosses the store boundary as text.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell of a dataset row, or a value read back from the store.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    BigInt(i64),
    Double(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the dataset column type this value belongs to, `None` for null.
    pub fn kind(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::BigInt(_) => Some(ColumnType::BigInt),
            Value::Double(_) => Some(ColumnType::Double),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
            Value::Text(_) => Some(ColumnType::Text),
        }
    }

    /// Converts the value into a DuckDB parameter.
    ///
    /// Timestamps are bound as text and cast by the store, the same way the
    /// DuckDB driver binds chrono values.
    pub(crate) fn to_parameter(&self) -> DuckValue {
        match self {
            Value::Null => DuckValue::Null,
            Value::Boolean(value) => DuckValue::Boolean(*value),
            Value::BigInt(value) => DuckValue::BigInt(*value),
            Value::Double(value) => DuckValue::Double(*value),
            Value::Timestamp(value) => DuckValue::Text(value.format(TIMESTAMP_FORMAT).to_string()),
            Value::Text(value) => DuckValue::Text(value.to_owned()),
        }
    }
}

impl From<DuckValue> for Value {
    fn from(value: DuckValue) -> Self {
        match value {
            DuckValue::Null => Value::Null,
            DuckValue::Boolean(value) => Value::Boolean(value),
            DuckValue::TinyInt(value) => Value::BigInt(value as i64),
            DuckValue::SmallInt(value) => Value::BigInt(value as i64),
            DuckValue::Int(value) => Value::BigInt(value as i64),
            DuckValue::BigInt(value) => Value::BigInt(value),
            DuckValue::UTinyInt(value) => Value::BigInt(value as i64),
            DuckValue::USmallInt(value) => Value::BigInt(value as i64),
            DuckValue::UInt(value) => Value::BigInt(value as i64),
            DuckValue::UBigInt(value) => i64::try_from(value)
                .map(Value::BigInt)
                .unwrap_or_else(|_| Value::Text(value.to_string())),
            DuckValue::HugeInt(value) => i64::try_from(value)
                .map(Value::BigInt)
                .unwrap_or_else(|_| Value::Text(value.to_string())),
            DuckValue::Float(value) => Value::Double(value as f64),
            DuckValue::Double(value) => Value::Double(value),
            DuckValue::Text(value) => Value::Text(value),
            DuckValue::Timestamp(unit, value) => DateTime::from_timestamp_micros(to_micros(unit, value))
                .map(|datetime| Value::Timestamp(datetime.naive_utc()))
                .unwrap_or(Value::Null),
            DuckValue::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(Duration::days(days as i64)))
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(Value::Timestamp)
                .unwrap_or(Value::Null),
            DuckValue::Time64(unit, value) => {
                let micros = to_micros(unit, value);
                NaiveTime::from_num_seconds_from_midnight_opt(
                    (micros / 1_000_000) as u32,
                    ((micros % 1_000_000) * 1_000) as u32,
                )
                .map(|time| Value::Text(time.format("%H:%M:%S").to_string()))
                .unwrap_or(Value::Null)
            }
            other => Value::Text(format!("{other:?}")),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::BigInt(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value}"),
            Value::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
            Value::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::BigInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value * 1_000_000,
        TimeUnit::Millisecond => value * 1_000,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_cross_the_boundary_as_text() {
        let datetime = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|date| date.and_hms_opt(8, 30, 0))
            .unwrap();
        assert_eq!(
            Value::Timestamp(datetime).to_parameter(),
            DuckValue::Text("2024-01-01 08:30:00".to_owned())
        );
    }

    #[test]
    fn store_values_are_normalized() {
        assert_eq!(Value::from(DuckValue::Int(7)), Value::BigInt(7));
        assert_eq!(Value::from(DuckValue::Float(1.5)), Value::Double(1.5));
        assert_eq!(Value::from(DuckValue::Text("NY".to_owned())), Value::from("NY"));

        let datetime = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap();
        let micros = datetime.and_utc().timestamp_micros();
        assert_eq!(
            Value::from(DuckValue::Timestamp(TimeUnit::Microsecond, micros)),
            Value::Timestamp(datetime)
        );
        assert_eq!(Value::from(DuckValue::Date32(19_724)), Value::Timestamp(datetime));
    }

    #[test]
    fn kind_follows_variant() {
        assert_eq!(Value::Null.kind(), None);
        assert_eq!(Value::from(3i64).kind(), Some(ColumnType::BigInt));
        assert_eq!(Value::from("x").kind(), Some(ColumnType::Text));
    }
}
