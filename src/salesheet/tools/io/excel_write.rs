use std::path::Path;

use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet as XlsxWorksheet};

use crate::salesheet::tools::error::Result;
use crate::salesheet::tools::io::store::{CellValue, MemoryWorksheet, Worksheet};

/// Writes the worksheets, in order, to a fresh workbook at `path`.
///
/// Rows loaded from a workbook are written back with their original cell
/// types and formulas. Projected rows are written as text so that reading
/// the workbook back yields exactly the strings that were projected.
pub fn write_worksheets(path: &Path, sheets: &[MemoryWorksheet]) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for sheet in sheets {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(sheet.title())?;

        for (row_idx, stored) in sheet.stored_rows().iter().enumerate() {
            let row_idx = row_idx as u32;
            match &stored.typed {
                Some(typed) => {
                    for (col_idx, cell) in typed.iter().enumerate() {
                        let format = match cell {
                            CellValue::DateTime(serial) if serial.fract() != 0.0 => &datetime_format,
                            _ => &date_format,
                        };
                        write_typed(worksheet, row_idx, col_idx as u16, cell, format)?;
                    }
                }
                None => {
                    for (col_idx, cell) in stored.cells.iter().enumerate() {
                        if cell.is_empty() {
                            continue;
                        }
                        worksheet.write_string(row_idx, col_idx as u16, cell)?;
                    }
                }
            }
        }
    }

    workbook_writer.save(path)?;
    Ok(())
}

fn write_typed(
    worksheet: &mut XlsxWorksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    date_format: &Format,
) -> Result<()> {
    match cell {
        CellValue::Empty => {}
        CellValue::Text(value) if value.is_empty() => {}
        CellValue::Text(value) => {
            worksheet.write_string(row, col, value)?;
        }
        CellValue::Number(value) => {
            worksheet.write_number(row, col, *value)?;
        }
        CellValue::Bool(value) => {
            worksheet.write_boolean(row, col, *value)?;
        }
        CellValue::DateTime(serial) => {
            worksheet.write_number_with_format(row, col, *serial, date_format)?;
        }
        CellValue::Formula { formula, cached } => {
            let formula = Formula::new(format!("={formula}")).set_result(cached.clone());
            worksheet.write_formula(row, col, formula)?;
        }
    }
    Ok(())
}
