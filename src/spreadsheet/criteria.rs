use crate::spreadsheet::range::Range;
use glob::Pattern;
use std::collections::HashSet;

/// What to read from a workbook and how to turn it into a dataset.
#[derive(Clone, Debug)]
pub struct Criteria {
    /// Sheet name pattern; the first sheet when absent.
    pub sheet_name_pattern: Option<Pattern>,

    /// Cell area to read; the whole used area when absent.
    pub range: Option<Range>,

    /// Take column names from the first row instead of `column1`, `column2`, ...
    pub header: bool,

    /// Maximum number of data rows, header excluded.
    pub rows_limit: Option<usize>,

    /// Cell texts read as null.
    pub nulls: HashSet<String>,

    /// Read error cells such as `#DIV/0!` as null instead of failing.
    pub error_as_null: bool,

    /// Drop rows without any cell.
    pub skip_empty_rows: bool,
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            sheet_name_pattern: None,
            range: None,
            header: true,
            rows_limit: None,
            nulls: HashSet::from([String::new()]),
            error_as_null: false,
            skip_empty_rows: false,
        }
    }
}

impl Criteria {
    pub(crate) fn accept(&self, sheet_name: &str) -> bool {
        self.sheet_name_pattern
            .as_ref()
            .map(|pattern| pattern.matches(sheet_name))
            .unwrap_or(true)
    }
}
