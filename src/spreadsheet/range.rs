use crate::error::SheetSyncError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::row_to_index;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),
}

/// Cell area to read, each bound optional (0-based, inclusive).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Range {
    pub row_lower_bound: Option<usize>,
    pub row_upper_bound: Option<usize>,
    pub col_lower_bound: Option<usize>,
    pub col_upper_bound: Option<usize>,
}

impl TryFrom<&str> for Range {
    type Error = SheetSyncError;

    /// Accepts `A1:D10`, `B2`, `B:D`, `2:10`, `C3:` and similar partial forms.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let pattern = Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").map_err(|_| RangeError::FormatError(value.to_owned()))?;
        let normalized = value.trim().to_ascii_uppercase();
        let captures = pattern
            .captures(&normalized)
            .ok_or_else(|| RangeError::FormatError(value.to_owned()))?;
        let bound = |group: usize, parse: fn(&str) -> Option<usize>| match captures.get(group).map(|matcher| matcher.as_str()) {
            None | Some("") => Ok(None),
            Some(text) => parse(text).map(Some).ok_or_else(|| RangeError::FormatError(value.to_owned())),
        };
        let range = Range {
            col_lower_bound: bound(1, col_to_index)?,
            row_lower_bound: bound(2, row_to_index)?,
            col_upper_bound: bound(4, col_to_index)?,
            row_upper_bound: bound(5, row_to_index)?,
        };
        let inverted = |lower: Option<usize>, upper: Option<usize>| lower.zip(upper).map(|(l, u)| l > u).unwrap_or(false);
        if inverted(range.row_lower_bound, range.row_upper_bound) || inverted(range.col_lower_bound, range.col_upper_bound) {
            Err(RangeError::FormatError(value.to_owned()))?;
        }
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_and_partial_ranges() {
        assert_eq!(
            Range::try_from("a1:d10").unwrap(),
            Range {
                row_lower_bound: Some(0),
                row_upper_bound: Some(9),
                col_lower_bound: Some(0),
                col_upper_bound: Some(3),
            }
        );
        assert_eq!(
            Range::try_from("B:D").unwrap(),
            Range {
                col_lower_bound: Some(1),
                col_upper_bound: Some(3),
                ..Default::default()
            }
        );
        assert_eq!(
            Range::try_from("2:").unwrap(),
            Range {
                row_lower_bound: Some(1),
                ..Default::default()
            }
        );
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert!(Range::try_from("A1-B2").is_err());
        assert!(Range::try_from("D1:B5").is_err());
        assert!(Range::try_from("A10:A2").is_err());
        assert!(Range::try_from(format!("A1:{}9", "Z".repeat(40)).as_str()).is_err());
        assert!(Range::try_from("A0:B2").is_err());
    }
}
