use crate::database::column::ColumnType;
use crate::database::value::Value;
use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

/// How a cell's raw value is to be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// `1` or `0`
    Boolean,
    Number,
    /// Serial date/time numbers, 1900 date system
    NumberDateTime1900,
    NumberDate1900,
    NumberTime1900,
    /// Serial date/time numbers, 1904 date system
    NumberDateTime1904,
    NumberDate1904,
    NumberTime1904,
    /// ISO 8601 text such as `2024-01-01T08:30:00`
    IsoDateTime,
    InlineString,
    /// Index into the shared string table
    SharedString,
    Error,
}

impl CellType {
    /// Date and time formats among the built-in number format ids.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => {
                Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 })
            }
            _ => None,
        }
    }

    /// Classifies a custom format code by the date and time tokens outside of
    /// quoted literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    fn is_1904(&self) -> bool {
        matches!(self, Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904)
    }
}

/// A non-empty cell read from a worksheet.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    /// Raw value as stored in the sheet XML
    pub(crate) value: String,
}

impl Cell {
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    pub(crate) fn to_double(&self) -> Result<f64, String> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("parse '{}' to double failed", self.value))
    }

    /// Integral values only, within the range a double represents exactly.
    pub(crate) fn to_bigint(&self) -> Result<i64, String> {
        let number = self.to_double()?;
        if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992f64 {
            Ok(number as i64)
        } else {
            Err(format!("parse '{}' to bigint failed", self.value))
        }
    }

    pub(crate) fn to_datetime(&self) -> Result<NaiveDateTime, String> {
        match self.kind {
            CellType::NumberDateTime1900
            | CellType::NumberDate1900
            | CellType::NumberTime1900
            | CellType::NumberDateTime1904
            | CellType::NumberDate1904
            | CellType::NumberTime1904 => serial_to_datetime(self.to_double()?, self.kind.is_1904())
                .ok_or_else(|| format!("serial date '{}' is out of range", self.value)),
            CellType::IsoDateTime => parse_iso_datetime(&self.value)
                .ok_or_else(|| format!("parse '{}' to datetime failed", self.value)),
            _ => Err(format!("parse '{}' to datetime failed", self.value)),
        }
    }

    /// Type of the value this cell holds on its own, before column inference.
    pub(crate) fn detect_type(&self) -> ColumnType {
        match self.kind {
            CellType::Boolean => ColumnType::Boolean,
            CellType::Number if self.to_bigint().is_ok() => ColumnType::BigInt,
            CellType::Number if self.to_double().is_ok() => ColumnType::Double,
            CellType::NumberDateTime1900
            | CellType::NumberDate1900
            | CellType::NumberDateTime1904
            | CellType::NumberDate1904 => ColumnType::Timestamp,
            CellType::IsoDateTime if self.to_datetime().is_ok() => ColumnType::Timestamp,
            _ => ColumnType::Text,
        }
    }

    /// Text rendering, used for headers, text columns and null literal matching.
    pub(crate) fn to_text(&self, shared_strings: &[String]) -> Result<String, String> {
        let text = match self.kind {
            CellType::Boolean => if self.value == "1" { "true" } else { "false" }.to_owned(),
            CellType::SharedString => {
                let index = self
                    .value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid shared string index '{}'", self.value))?;
                shared_strings
                    .get(index)
                    .cloned()
                    .ok_or_else(|| format!("shared string {index} does not exist"))?
            }
            CellType::NumberDate1900 | CellType::NumberDate1904 => self.to_datetime()?.format("%Y-%m-%d").to_string(),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => {
                self.to_datetime()?.format("%Y-%m-%d %H:%M:%S").to_string()
            }
            CellType::NumberTime1900 | CellType::NumberTime1904 => serial_to_time(self.to_double()?)
                .ok_or_else(|| format!("serial time '{}' is out of range", self.value))?,
            CellType::IsoDateTime => self.value.replacen('T', " ", 1),
            _ => self.value.to_owned(),
        };
        Ok(text)
    }

    /// Converts the cell to a value of the column's inferred type.
    pub(crate) fn to_value(&self, kind: ColumnType, shared_strings: &[String]) -> Result<Value, String> {
        match kind {
            ColumnType::Boolean => Ok(Value::Boolean(self.value == "1")),
            ColumnType::BigInt => self.to_bigint().map(Value::BigInt),
            ColumnType::Double => self.to_double().map(Value::Double),
            ColumnType::Timestamp => self.to_datetime().map(Value::Timestamp),
            ColumnType::Text => self.to_text(shared_strings).map(Value::Text),
        }
    }
}

/// Serial day number to date and time.
///
/// The 1900 system counts the nonexistent 1900-02-29 as day 60, so serials
/// before it are shifted by one day. The 1904 system starts at 1904-01-01.
fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1_462
    } else if days < 60 {
        1
    } else {
        0
    };
    let micros = (serial.fract() * 86_400_000_000f64).round() as i64;
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::try_days(days.checked_add(offset)?)?)?
        .checked_add_signed(Duration::microseconds(micros))
}

/// Time of day of a serial number as `HH:MM:SS`.
fn serial_to_time(serial: f64) -> Option<String> {
    let seconds = (serial.fract() * 86_400f64).round() as u32 % 86_400;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).map(|time| time.format("%H:%M:%S").to_string())
}

fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell {
            row: 0,
            col: 0,
            kind,
            value: value.to_owned(),
        }
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|date| date.and_hms_opt(h, min, s)).unwrap()
    }

    #[test]
    fn custom_formats() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd hh:mm", true), CellType::NumberDateTime1904);
        assert_eq!(CellType::parse_custom_number_format("hh:mm:ss", false), CellType::NumberTime1900);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("0.00\" days\"", false), CellType::Number);
    }

    #[test]
    fn serial_dates_in_both_systems() {
        assert_eq!(cell(CellType::NumberDate1900, "45292").to_datetime().unwrap(), datetime(2024, 1, 1, 0, 0, 0));
        assert_eq!(cell(CellType::NumberDate1900, "1").to_datetime().unwrap(), datetime(1900, 1, 1, 0, 0, 0));
        assert_eq!(cell(CellType::NumberDate1900, "61").to_datetime().unwrap(), datetime(1900, 3, 1, 0, 0, 0));
        assert_eq!(cell(CellType::NumberDate1904, "0").to_datetime().unwrap(), datetime(1904, 1, 1, 0, 0, 0));
        assert_eq!(
            cell(CellType::NumberDateTime1900, "45292.5").to_datetime().unwrap(),
            datetime(2024, 1, 1, 12, 0, 0)
        );
    }

    #[test]
    fn huge_serial_dates_are_errors() {
        for value in ["1e20", "-1e20", "9.3e18"] {
            let error = cell(CellType::NumberDate1900, value).to_datetime().unwrap_err();
            assert!(error.contains("out of range"), "{error}");
        }
        assert!(cell(CellType::NumberDateTime1904, "1e300").to_value(ColumnType::Timestamp, &[]).is_err());
    }

    #[test]
    fn detect_and_render() {
        assert_eq!(cell(CellType::Number, "100").detect_type(), ColumnType::BigInt);
        assert_eq!(cell(CellType::Number, "1.5").detect_type(), ColumnType::Double);
        assert_eq!(cell(CellType::Boolean, "1").detect_type(), ColumnType::Boolean);
        assert_eq!(cell(CellType::NumberTime1900, "0.75").detect_type(), ColumnType::Text);
        assert_eq!(cell(CellType::IsoDateTime, "2024-01-02").detect_type(), ColumnType::Timestamp);

        let shared = vec!["NY".to_owned()];
        assert_eq!(cell(CellType::SharedString, "0").to_text(&shared).unwrap(), "NY");
        assert!(cell(CellType::SharedString, "3").to_text(&shared).is_err());
        assert_eq!(cell(CellType::NumberTime1900, "0.75").to_text(&shared).unwrap(), "18:00:00");
        assert_eq!(cell(CellType::NumberDate1900, "45292").to_text(&shared).unwrap(), "2024-01-01");
        assert_eq!(cell(CellType::Boolean, "0").to_text(&shared).unwrap(), "false");
    }

    #[test]
    fn to_value_follows_column_type() {
        let number = cell(CellType::Number, "100");
        assert_eq!(number.to_value(ColumnType::BigInt, &[]).unwrap(), Value::BigInt(100));
        assert_eq!(number.to_value(ColumnType::Double, &[]).unwrap(), Value::Double(100.0));
        assert_eq!(number.to_value(ColumnType::Text, &[]).unwrap(), Value::from("100"));
        assert!(cell(CellType::Number, "1.5").to_value(ColumnType::BigInt, &[]).is_err());
    }
}
