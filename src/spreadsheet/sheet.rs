use crate::database::column::Column;
use crate::database::column::ColumnType;
use crate::database::dataset::Dataset;
use crate::database::value::Value;
use crate::error::SheetSyncError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;

/// Cells of one worksheet, restricted to the requested range, in sheet order.
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    cells: Vec<Cell>,
    /// Requested area
    range: Range,
    /// Row span after which reading can stop, header included
    limit: Option<usize>,
    skip_empty_rows: bool,
    /// Area actually covered by cells
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(super) fn new(file_name: &str, name: &str, range: Option<Range>, limit: Option<usize>, skip_empty_rows: bool) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            range: range.unwrap_or_default(),
            // Empty rows do not count towards the limit when they are skipped
            limit: limit.filter(|_| !skip_empty_rows),
            skip_empty_rows,
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn before_row_lower_bound(&self, row: usize) -> bool {
        self.range.row_lower_bound.map(|lower| row < lower).unwrap_or(false)
    }

    /// Past the requested rows or the row limit; later cells can be ignored.
    pub(super) fn after_row_upper_bound(&self, row: usize) -> bool {
        let is_out_of_bound = self.range.row_upper_bound.map(|upper| upper < row).unwrap_or(false);
        let is_more_than_limit = self
            .row_lower_bound
            .zip(self.limit)
            .map(|(lower, limit)| lower + limit <= row)
            .unwrap_or(false);
        is_out_of_bound || is_more_than_limit
    }

    fn before_col_lower_bound(&self, col: usize) -> bool {
        self.range.col_lower_bound.map(|lower| col < lower).unwrap_or(false)
    }

    fn after_col_upper_bound(&self, col: usize) -> bool {
        self.range.col_upper_bound.map(|upper| upper < col).unwrap_or(false)
    }

    pub(super) fn contains(&self, row: usize, col: usize) -> bool {
        !self.before_row_lower_bound(row)
            && !self.after_row_upper_bound(row)
            && !self.before_col_lower_bound(col)
            && !self.after_col_upper_bound(col)
    }

    /// Adds a cell; cells arrive row by row, left to right.
    pub(super) fn push(&mut self, cell: Cell) {
        if self.row_lower_bound.is_none() {
            self.row_lower_bound = Some(cell.row);
        }
        if self.col_lower_bound.map(|lower| cell.col < lower).unwrap_or(true) {
            self.col_lower_bound = Some(cell.col);
        }
        if self.col_upper_bound.map(|upper| upper < cell.col).unwrap_or(true) {
            self.col_upper_bound = Some(cell.col);
        }
        self.row_upper_bound = Some(cell.row);
        self.cells.push(cell);
    }

    fn col_bounds(&self) -> Option<(usize, usize)> {
        let lower = self.range.col_lower_bound.or(self.col_lower_bound)?;
        let upper = self.range.col_upper_bound.or(self.col_upper_bound)?;
        Some((lower, upper))
    }

    /// Rectangular view of the sheet: one entry per row index with one slot
    /// per column, `None` where the sheet has no cell.
    ///
    /// Rows start at the requested lower bound (or the first cell when empty
    /// rows are skipped) and end at the last cell.
    pub(crate) fn grid(&self) -> Vec<(usize, Vec<Option<&Cell>>)> {
        let (Some(first), Some(last), Some((col_lower, col_upper))) =
            (self.row_lower_bound, self.row_upper_bound, self.col_bounds())
        else {
            return Vec::new();
        };
        let row_lower = self
            .range
            .row_lower_bound
            .filter(|_| !self.skip_empty_rows)
            .unwrap_or(first)
            .min(first);
        let width = col_upper + 1 - col_lower;

        let mut grid = Vec::new();
        let mut cells = self.cells.iter().peekable();
        for row in row_lower..=last {
            let mut record = vec![None; width];
            let mut occupied = false;
            while let Some(cell) = cells.next_if(|cell| cell.row == row) {
                record[cell.col - col_lower] = Some(cell);
                occupied = true;
            }
            if occupied || !self.skip_empty_rows {
                grid.push((row, record));
            }
        }
        grid
    }

    /// Builds a dataset: column names from the header row (or generated),
    /// one inferred type per column, null literals and missing cells as null.
    pub(crate) fn to_dataset(&self, criteria: &Criteria, shared_strings: &[String]) -> Result<Dataset, SheetSyncError> {
        let grid = self.grid();
        let Some((col_lower, _)) = self.col_bounds().filter(|_| !grid.is_empty()) else {
            return Err(SpreadsheetError::EmptySheetError(self.file_name.to_owned(), self.name.to_owned()).into());
        };
        let width = grid[0].1.len();
        let cell_error = |cell: &Cell, message: String| {
            SpreadsheetError::CellValueError(self.file_name.to_owned(), self.name.to_owned(), cell.reference(), message)
        };

        let (names, records) = if criteria.header {
            let (row, header) = &grid[0];
            let names = header
                .iter()
                .copied()
                .enumerate()
                .map(|(offset, cell)| {
                    let name = match cell {
                        Some(cell) => cell.to_text(shared_strings).map_err(|message| cell_error(cell, message))?,
                        None => String::new(),
                    };
                    let name = name.trim();
                    if name.is_empty() {
                        Err(SpreadsheetError::MissingHeaderColumnError(
                            self.file_name.to_owned(),
                            self.name.to_owned(),
                            index_to_reference(*row, col_lower + offset),
                        ))?
                    }
                    Ok::<_, SheetSyncError>(name.to_owned())
                })
                .collect::<Result<Vec<_>, _>>()?;
            (names, &grid[1..])
        } else {
            ((1..=width).map(|index| format!("column{index}")).collect(), &grid[..])
        };
        let records = &records[..criteria.rows_limit.unwrap_or(records.len()).min(records.len())];

        let mut columns = Vec::with_capacity(width);
        let mut rows = vec![Vec::with_capacity(width); records.len()];
        for (index, name) in names.iter().enumerate() {
            let mut cells = Vec::with_capacity(records.len());
            for (_, record) in records {
                let cell = match record[index] {
                    Some(cell) if !criteria.nulls.is_empty() => {
                        let text = cell.to_text(shared_strings).map_err(|message| cell_error(cell, message))?;
                        Some(cell).filter(|_| !criteria.nulls.contains(&text))
                    }
                    cell => cell,
                };
                cells.push(cell);
            }

            let types: Vec<ColumnType> = cells.iter().flatten().map(|cell| cell.detect_type()).collect();
            let kind = ColumnType::detect(&types, types.len() < cells.len());
            for (row, cell) in cells.into_iter().enumerate() {
                let value = match cell {
                    Some(cell) => cell.to_value(kind, shared_strings).map_err(|message| cell_error(cell, message))?,
                    None => Value::Null,
                };
                rows[row].push(value);
            }
            columns.push(Column::new(name, kind));
        }

        tracing::debug!(
            sheet = %self.name,
            columns = columns.len(),
            rows = rows.len(),
            "sheet converted to dataset"
        );
        Ok(Dataset::new(columns, rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;
    use chrono::NaiveDate;

    fn push(sheet: &mut Sheet, row: usize, col: usize, kind: CellType, value: &str) {
        sheet.push(Cell {
            row,
            col,
            kind,
            value: value.to_owned(),
        });
    }

    fn sales_sheet(skip_empty_rows: bool) -> Sheet {
        let mut sheet = Sheet::new("sales.xlsx", "Sales", None, None, skip_empty_rows);
        push(&mut sheet, 0, 0, CellType::SharedString, "0");
        push(&mut sheet, 0, 1, CellType::SharedString, "1");
        push(&mut sheet, 0, 2, CellType::SharedString, "2");
        push(&mut sheet, 1, 0, CellType::NumberDate1900, "45292");
        push(&mut sheet, 1, 1, CellType::SharedString, "3");
        push(&mut sheet, 1, 2, CellType::Number, "100");
        push(&mut sheet, 3, 0, CellType::NumberDate1900, "45293");
        push(&mut sheet, 3, 1, CellType::SharedString, "4");
        push(&mut sheet, 3, 2, CellType::Number, "50.5");
        sheet
    }

    fn shared_strings() -> Vec<String> {
        ["date", "market", "amount", "NY", "LA"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sheet_initial() {
        let sheet = Sheet::new("", "", None, None, false);

        assert!(sheet.is_empty());
        assert_eq!(sheet.row_lower_bound, None);
        assert_eq!(sheet.col_upper_bound, None);
        assert!(sheet.grid().is_empty());
    }

    #[test]
    fn sheet_bounds_follow_cells() {
        let mut sheet = Sheet::new("", "", None, None, false);
        push(&mut sheet, 1, 1, CellType::InlineString, "a");
        push(&mut sheet, 1, 3, CellType::InlineString, "b");
        push(&mut sheet, 3, 1, CellType::InlineString, "c");
        push(&mut sheet, 3, 3, CellType::InlineString, "d");

        assert_eq!(sheet.row_lower_bound, Some(1));
        assert_eq!(sheet.row_upper_bound, Some(3));
        assert_eq!(sheet.col_lower_bound, Some(1));
        assert_eq!(sheet.col_upper_bound, Some(3));

        let grid = sheet.grid();
        assert_eq!(grid.iter().map(|(row, _)| *row).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(grid[0].1.iter().map(|cell| cell.is_some()).collect::<Vec<_>>(), vec![true, false, true]);
        assert!(grid[1].1.iter().all(Option::is_none));
    }

    #[test]
    fn range_and_limit() {
        let range = Range {
            row_lower_bound: Some(0),
            row_upper_bound: Some(5),
            col_lower_bound: Some(0),
            col_upper_bound: Some(5),
        };
        let mut sheet = Sheet::new("", "", Some(range), Some(2), false);
        assert!(!sheet.contains(6, 0));
        assert!(!sheet.contains(0, 6));
        push(&mut sheet, 1, 1, CellType::InlineString, "a");
        assert!(sheet.contains(2, 1));
        assert!(sheet.after_row_upper_bound(3));

        let grid = sheet.grid();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].1.len(), 6);
    }

    #[test]
    fn sales_sheet_to_dataset() {
        let dataset = sales_sheet(true).to_dataset(&Criteria::default(), &shared_strings()).unwrap();

        assert_eq!(dataset.columns(), &[
            Column::new("date", ColumnType::Timestamp),
            Column::new("market", ColumnType::Text),
            Column::new("amount", ColumnType::Double),
        ]);
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|date| date.and_hms_opt(0, 0, 0)).unwrap();
        assert_eq!(dataset.rows()[0], vec![Value::Timestamp(first), Value::from("NY"), Value::from(100.0)]);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn empty_rows_become_null_rows_unless_skipped() {
        let dataset = sales_sheet(false).to_dataset(&Criteria::default(), &shared_strings()).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.rows()[1], vec![Value::Null, Value::Null, Value::Null]);
        // nulls rule out bool and int64
        assert_eq!(dataset.column_type("amount"), Some(ColumnType::Double));
    }

    #[test]
    fn generated_names_and_null_literals() {
        let mut sheet = Sheet::new("", "Data", None, None, false);
        push(&mut sheet, 0, 0, CellType::Number, "1");
        push(&mut sheet, 0, 1, CellType::InlineString, "n/a");
        push(&mut sheet, 1, 0, CellType::Number, "2");
        push(&mut sheet, 1, 1, CellType::InlineString, "x");

        let criteria = Criteria {
            header: false,
            nulls: ["n/a".to_owned()].into(),
            ..Default::default()
        };
        let dataset = sheet.to_dataset(&criteria, &[]).unwrap();
        assert_eq!(dataset.column_names(), vec!["column1", "column2"]);
        assert_eq!(dataset.column_type("column1"), Some(ColumnType::BigInt));
        assert_eq!(dataset.rows()[0], vec![Value::BigInt(1), Value::Null]);

        let limited = sheet.to_dataset(&Criteria { rows_limit: Some(1), ..criteria }, &[]).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn out_of_range_date_is_a_cell_error() {
        let mut sheet = Sheet::new("book.xlsx", "Data", None, None, false);
        push(&mut sheet, 0, 0, CellType::InlineString, "due");
        push(&mut sheet, 1, 0, CellType::NumberDate1900, "45292");
        push(&mut sheet, 2, 0, CellType::NumberDate1900, "1e20");

        let error = sheet.to_dataset(&Criteria::default(), &[]).unwrap_err();
        assert!(matches!(
            error,
            SheetSyncError::SpreadsheetError(SpreadsheetError::CellValueError(_, _, ref reference, _)) if reference == "A3"
        ));
    }

    #[test]
    fn missing_header_cell_is_an_error() {
        let mut sheet = Sheet::new("book.xlsx", "Data", None, None, false);
        push(&mut sheet, 0, 0, CellType::InlineString, "id");
        push(&mut sheet, 1, 0, CellType::Number, "1");
        push(&mut sheet, 1, 1, CellType::Number, "2");

        let error = sheet.to_dataset(&Criteria::default(), &[]).unwrap_err();
        assert!(error.to_string().contains("B1"), "{error}");
        assert!(Sheet::new("", "", None, None, false).to_dataset(&Criteria::default(), &[]).is_err());
    }
}
