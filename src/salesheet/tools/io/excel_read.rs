use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
use tracing::debug;

use crate::salesheet::tools::error::{Result, ToolError};
use crate::salesheet::tools::io::store::{CellValue, MemoryWorksheet};

/// Reads every worksheet of the workbook, in workbook order.
///
/// Cells keep the type they were stored with, and formula cells keep their
/// formula, so that a worksheet written back unchanged is not flattened to
/// text. Leading blank rows above the used range are kept so that positions
/// read back match the positions a spreadsheet application shows.
pub fn read_worksheets(path: &Path) -> Result<Vec<MemoryWorksheet>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let values = read_required_sheet(&mut workbook, &name)?;
        let formulas = match workbook.worksheet_formula(&name) {
            Some(range) => Some(range?),
            None => None,
        };
        let rows = typed_grid(&values, formulas.as_ref());
        debug!(worksheet = %name, row_count = rows.len(), "worksheet loaded");
        sheets.push(MemoryWorksheet::with_loaded_rows(name, rows));
    }
    Ok(sheets)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::SpreadsheetNotFound(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

/// Lays the used cells of both ranges out at their absolute positions.
fn typed_grid(values: &Range<DataType>, formulas: Option<&Range<String>>) -> Vec<Vec<CellValue>> {
    let mut grid: Vec<Vec<CellValue>> = Vec::new();

    if let Some((first_row, first_col)) = values.start() {
        for (row, col, value) in values.used_cells() {
            place(
                &mut grid,
                first_row as usize + row,
                first_col as usize + col,
                cell_value(value),
            );
        }
    }

    let formula_start = formulas.and_then(|range| range.start().map(|start| (range, start)));
    if let Some((formulas, (first_row, first_col))) = formula_start {
        for (row, col, formula) in formulas.used_cells() {
            let (row, col) = (first_row as usize + row, first_col as usize + col);
            let cached = grid
                .get(row)
                .and_then(|cells| cells.get(col))
                .map(CellValue::display)
                .unwrap_or_default();
            place(
                &mut grid,
                row,
                col,
                CellValue::Formula {
                    formula: formula.trim_start_matches('=').to_string(),
                    cached,
                },
            );
        }
    }

    for cells in &mut grid {
        while cells.last().is_some_and(CellValue::is_empty) {
            cells.pop();
        }
    }
    while grid.last().is_some_and(Vec::is_empty) {
        grid.pop();
    }
    grid
}

fn place(grid: &mut Vec<Vec<CellValue>>, row: usize, col: usize, value: CellValue) {
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let cells = &mut grid[row];
    if cells.len() <= col {
        cells.resize(col + 1, CellValue::Empty);
    }
    cells[col] = value;
}

fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) | DataType::Duration(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(serial) => CellValue::DateTime(*serial),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}
