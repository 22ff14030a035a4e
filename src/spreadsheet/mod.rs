//! # Spreadsheet Module
//!
//! Reads one worksheet of a workbook into a [`Dataset`]: cells are parsed
//! from the package parts, restricted by [`Criteria`], named from the header
//! row and typed per column.

pub mod criteria;
pub(crate) mod cell;
pub(crate) mod excel;
pub mod range;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

use crate::database::dataset::Dataset;
use crate::error::ResultMessage;
use crate::error::SheetSyncError;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Part '{0}' is missing from the workbook")]
    FileError(String),

    #[error("Workbook '{0}' has no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Unsupported spreadsheet format '{0}', expected .xlsx, .xlsm or .xlam")]
    UnsupportedFormatError(String),

    #[error("No sheet of '{0}' matches '{1}'")]
    SheetNotFoundError(String, String),

    #[error("Sheet '{1}' of '{0}' has no cells")]
    EmptySheetError(String, String),

    #[error("Missing column name at {2} of sheet '{1}' in '{0}'")]
    MissingHeaderColumnError(String, String, String),

    #[error("Invalid cell value at {2} of sheet '{1}' in '{0}': {3}")]
    CellValueError(String, String, String, String),
}

/// A workbook that can produce datasets.
pub trait Spreadsheet {
    /// Location the workbook was opened from.
    fn name(&self) -> &str;

    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Reads the first sheet accepted by the criteria.
    fn read_dataset(&mut self, criteria: &Criteria) -> Result<Dataset, SheetSyncError>;
}

/// Opens a workbook from a local path or remote URL, choosing the reader by extension.
pub fn open_spreadsheet(location: &str) -> Result<Box<dyn Spreadsheet>, SheetSyncError> {
    let path = location.split(['?', '#']).next().unwrap_or(location).to_ascii_lowercase();
    let spreadsheet: Box<dyn Spreadsheet> = if [".xlsx", ".xlsm", ".xlam"].iter().any(|extension| path.ends_with(extension)) {
        Box::new(XlsxSpreadsheet::open(location).with_prefix(location)?)
    } else {
        Err(SpreadsheetError::UnsupportedFormatError(location.to_owned()))?
    };
    Ok(spreadsheet)
}

/// Opens the workbook and reads one dataset, prefixing errors with its location.
pub fn read_dataset(location: &str, criteria: &Criteria) -> Result<Dataset, SheetSyncError> {
    let mut spreadsheet = open_spreadsheet(location)?;
    spreadsheet.read_dataset(criteria).with_prefix(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_chosen_by_extension() {
        let error = open_spreadsheet("report.ods").err().unwrap();
        assert!(matches!(
            error,
            SheetSyncError::SpreadsheetError(SpreadsheetError::UnsupportedFormatError(_))
        ));
        assert!(open_spreadsheet("https://example.com/report.csv?token=1").is_err());
        // Supported extension, missing file
        assert!(matches!(
            open_spreadsheet("missing-report.XLSX").err().unwrap(),
            SheetSyncError::WithContextError(_)
        ));
    }

    #[test]
    fn reads_dataset_through_trait_object() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("sales.xlsx");
        xlsx::tests::write_workbook(&path);

        let mut spreadsheet = open_spreadsheet(path.to_str().unwrap()).unwrap();
        assert_eq!(spreadsheet.name(), path.to_str().unwrap());
        let criteria = Criteria {
            sheet_name_pattern: Some(glob::Pattern::new("Sales").unwrap()),
            ..Default::default()
        };
        assert_eq!(spreadsheet.read_dataset(&criteria).unwrap().len(), 2);
        assert_eq!(read_dataset(path.to_str().unwrap(), &criteria).unwrap().len(), 2);
    }
}
