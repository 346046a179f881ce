pub mod excel_read;
pub mod excel_write;
pub mod records;
pub mod store;
pub mod workbook;
