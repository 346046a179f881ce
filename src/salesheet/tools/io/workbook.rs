use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::salesheet::tools::error::{Result, ToolError};
use crate::salesheet::tools::io::excel_read;
use crate::salesheet::tools::io::excel_write;
use crate::salesheet::tools::io::store::{MemorySpreadsheet, MemoryWorksheet, Spreadsheet, Worksheet};
use crate::salesheet::tools::project::Schema;
use crate::salesheet::tools::route::validate_sheet_name;

/// Spreadsheet backed by an `.xlsx` workbook on disk.
///
/// The workbook is loaded once when opened; mutations happen in memory and
/// [`Spreadsheet::commit`] rewrites the file when any worksheet changed.
#[derive(Debug)]
pub struct XlsxSpreadsheet {
    path: PathBuf,
    inner: MemorySpreadsheet,
}

impl XlsxSpreadsheet {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::SpreadsheetNotFound(path.display().to_string()));
        }
        let sheets = excel_read::read_worksheets(path)?;
        info!(sheet_count = sheets.len(), "workbook opened");
        Ok(Self {
            path: path.to_path_buf(),
            inner: MemorySpreadsheet::from_sheets(path.display().to_string(), sheets),
        })
    }

    /// Snapshot of the worksheets as currently held in memory.
    pub fn sheets(&self) -> &[MemoryWorksheet] {
        self.inner.sheets()
    }

    pub fn into_memory(self) -> MemorySpreadsheet {
        self.inner
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn location(&self) -> &str {
        self.inner.location()
    }

    fn worksheet(&mut self, name: &str) -> Result<&mut dyn Worksheet> {
        self.inner.worksheet(name)
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    fn commit(&mut self) -> Result<()> {
        if !self.inner.is_modified() {
            debug!("no worksheet changed, workbook left as is");
            return Ok(());
        }
        excel_write::write_worksheets(&self.path, self.inner.sheets())?;
        self.inner.mark_saved();
        info!("workbook saved");
        Ok(())
    }
}

/// Creates a workbook whose worksheets each start with the header row of
/// their schema. Existing files are left untouched.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn create_workbook(path: &Path, worksheets: &[(&str, &Schema)]) -> Result<()> {
    if path.exists() {
        warn!("workbook already exists, leaving it unchanged");
        return Err(ToolError::Configuration(format!(
            "{} already exists",
            path.display()
        )));
    }

    let mut sheets: Vec<MemoryWorksheet> = Vec::with_capacity(worksheets.len());
    for (name, schema) in worksheets {
        validate_sheet_name(name).map_err(ToolError::Configuration)?;
        if sheets.iter().any(|sheet| sheet.title() == *name) {
            continue;
        }
        sheets.push(MemoryWorksheet::with_rows(*name, vec![schema.header_row()]));
    }

    excel_write::write_worksheets(path, &sheets)?;
    info!(sheet_count = sheets.len(), "workbook created");
    Ok(())
}
