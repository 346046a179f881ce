//! Destination store abstraction: an ordered list of rows per worksheet,
//! addressed by 1-based position.

use std::fmt;

use chrono::{Duration, NaiveDate};

use crate::salesheet::tools::error::{Result, StoreError, ToolError};
use crate::salesheet::tools::model::Row;

/// How a store should interpret written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Values are taken as if typed by a user; formula-like text stays literal.
    UserEntered,
    /// Values are stored without any interpretation.
    Raw,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::UserEntered => write!(f, "USER_ENTERED"),
            WriteMode::Raw => write!(f, "RAW"),
        }
    }
}

/// A single worksheet of the destination store.
///
/// Calls are blocking and must be issued sequentially: deleting a row shifts
/// every position below it.
pub trait Worksheet {
    fn title(&self) -> &str;

    /// Number of rows currently in the worksheet, header included.
    fn row_count(&self) -> usize;

    /// Values of the 1-based column, one entry per row in row order.
    fn read_column(&mut self, index: usize) -> std::result::Result<Vec<String>, StoreError>;

    fn delete_row(&mut self, position: usize) -> std::result::Result<(), StoreError>;

    /// Inserts `rows` so that the first lands at `position`. A position one
    /// past the last row appends.
    fn insert_rows(
        &mut self,
        rows: &[Row],
        position: usize,
        mode: WriteMode,
    ) -> std::result::Result<(), StoreError>;

    fn append_rows(&mut self, rows: &[Row], mode: WriteMode) -> std::result::Result<(), StoreError>;
}

/// A spreadsheet holding named worksheets.
pub trait Spreadsheet {
    /// Identifier of the spreadsheet used in log lines and errors.
    fn location(&self) -> &str;

    /// Resolves a worksheet by name, failing with
    /// [`ToolError::DestinationNotFound`] when it does not exist.
    fn worksheet(&mut self, name: &str) -> Result<&mut dyn Worksheet>;

    /// Persists every mutation performed so far.
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A cell loaded from a workbook, with the type it was stored with.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Spreadsheet serial date, as stored by the workbook.
    DateTime(f64),
    /// Formula text without the leading `=`, plus its cached display value.
    Formula { formula: String, cached: String },
}

impl CellValue {
    /// The text a spreadsheet application shows for the cell.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(value) => value.clone(),
            CellValue::Number(value) => format_number(*value),
            CellValue::Bool(value) => value.to_string().to_uppercase(),
            CellValue::DateTime(serial) => format_serial_date(*serial),
            CellValue::Formula { cached, .. } => cached.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Serial dates count days from 1899-12-30 in the 1900 date system.
fn format_serial_date(serial: f64) -> String {
    // Serial 2958465 is 9999-12-31, the last date a workbook can hold.
    if !(0.0..2_958_466.0).contains(&serial) {
        return format_number(serial);
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    let moment = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.and_hms_opt(0, 0, 0))
        .and_then(|epoch| epoch.checked_add_signed(Duration::milliseconds(millis)));
    match moment {
        Some(moment) if serial.fract() == 0.0 => moment.format("%Y-%m-%d").to_string(),
        Some(moment) => moment.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format_number(serial),
    }
}

/// A row as held by the in-memory store.
///
/// Rows loaded from a workbook keep their typed cells so that saving the
/// workbook writes them back unchanged. Rows written by a sync carry text
/// only.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub cells: Row,
    pub mode: WriteMode,
    pub typed: Option<Vec<CellValue>>,
}

/// Worksheet kept entirely in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryWorksheet {
    title: String,
    rows: Vec<StoredRow>,
    modified: bool,
}

impl MemoryWorksheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
            modified: false,
        }
    }

    /// Worksheet pre-populated with raw rows.
    pub fn with_rows(title: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            title: title.into(),
            rows: rows
                .into_iter()
                .map(|cells| StoredRow {
                    cells,
                    mode: WriteMode::Raw,
                    typed: None,
                })
                .collect(),
            modified: false,
        }
    }

    /// Worksheet pre-populated with typed rows loaded from a workbook. The
    /// text of each cell is its displayed value.
    pub fn with_loaded_rows(title: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            title: title.into(),
            rows: rows
                .into_iter()
                .map(|typed| StoredRow {
                    cells: typed.iter().map(CellValue::display).collect(),
                    mode: WriteMode::Raw,
                    typed: Some(typed),
                })
                .collect(),
            modified: false,
        }
    }

    /// Whether any row was deleted, inserted or appended since loading or
    /// the last [`MemoryWorksheet::mark_saved`].
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().map(|row| &row.cells)
    }

    pub fn stored_rows(&self) -> &[StoredRow] {
        &self.rows
    }

    /// Row at the 1-based position.
    pub fn row(&self, position: usize) -> Option<&Row> {
        position
            .checked_sub(1)
            .and_then(|index| self.rows.get(index))
            .map(|row| &row.cells)
    }

    fn stored(rows: &[Row], mode: WriteMode) -> impl Iterator<Item = StoredRow> + '_ {
        rows.iter().map(move |cells| StoredRow {
            cells: cells.clone(),
            mode,
            typed: None,
        })
    }
}

impl Worksheet for MemoryWorksheet {
    fn title(&self) -> &str {
        &self.title
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn read_column(&mut self, index: usize) -> std::result::Result<Vec<String>, StoreError> {
        let offset = index.checked_sub(1).ok_or(StoreError::InvalidColumn(index))?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.cells.get(offset).cloned().unwrap_or_default())
            .collect())
    }

    fn delete_row(&mut self, position: usize) -> std::result::Result<(), StoreError> {
        if position == 0 || position > self.rows.len() {
            return Err(StoreError::PositionOutOfRange {
                position,
                limit: self.rows.len(),
            });
        }
        self.rows.remove(position - 1);
        self.modified = true;
        Ok(())
    }

    fn insert_rows(
        &mut self,
        rows: &[Row],
        position: usize,
        mode: WriteMode,
    ) -> std::result::Result<(), StoreError> {
        let limit = self.rows.len() + 1;
        if position == 0 || position > limit {
            return Err(StoreError::PositionOutOfRange { position, limit });
        }
        let index = position - 1;
        self.rows.splice(index..index, Self::stored(rows, mode));
        self.modified = true;
        Ok(())
    }

    fn append_rows(&mut self, rows: &[Row], mode: WriteMode) -> std::result::Result<(), StoreError> {
        if !rows.is_empty() {
            self.rows.extend(Self::stored(rows, mode));
            self.modified = true;
        }
        Ok(())
    }
}

/// Spreadsheet kept entirely in memory, worksheets in creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySpreadsheet {
    location: String,
    sheets: Vec<MemoryWorksheet>,
}

impl MemorySpreadsheet {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            sheets: Vec::new(),
        }
    }

    pub fn from_sheets(location: impl Into<String>, sheets: Vec<MemoryWorksheet>) -> Self {
        Self {
            location: location.into(),
            sheets,
        }
    }

    /// Adds a worksheet, replacing any existing one with the same title.
    pub fn add_sheet(&mut self, sheet: MemoryWorksheet) {
        match self.sheets.iter().position(|existing| existing.title == sheet.title) {
            Some(index) => self.sheets[index] = sheet,
            None => self.sheets.push(sheet),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&MemoryWorksheet> {
        self.sheets.iter().find(|sheet| sheet.title == name)
    }

    pub fn sheets(&self) -> &[MemoryWorksheet] {
        &self.sheets
    }

    pub fn is_modified(&self) -> bool {
        self.sheets.iter().any(MemoryWorksheet::is_modified)
    }

    pub fn mark_saved(&mut self) {
        for sheet in &mut self.sheets {
            sheet.mark_saved();
        }
    }
}

impl Spreadsheet for MemorySpreadsheet {
    fn location(&self) -> &str {
        &self.location
    }

    fn worksheet(&mut self, name: &str) -> Result<&mut dyn Worksheet> {
        match self.sheets.iter_mut().find(|sheet| sheet.title == name) {
            Some(sheet) => Ok(sheet as &mut dyn Worksheet),
            None => Err(ToolError::DestinationNotFound {
                spreadsheet: self.location.clone(),
                worksheet: name.to_string(),
            }),
        }
    }
}
