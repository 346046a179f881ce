#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use salesheet_tools::config::SyncConfig;
use salesheet_tools::derive::RateEntry;
use salesheet_tools::io::store::{MemorySpreadsheet, MemoryWorksheet};
use salesheet_tools::model::{DocumentKind, DocumentState, InvoiceRef, LineItem, Row, SourceRecord};
use salesheet_tools::project::Schema;

pub fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn config() -> SyncConfig {
    let mut config = SyncConfig::new("memory://sales", "Orders", "Invoices");
    config.order_mapping = Some(r#"{"Acme": "ORD-A", "Globex": "ORD-G"}"#.to_string());
    config.invoice_mapping = Some(r#"{"Acme": "INV-A"}"#.to_string());
    config.rates = vec![RateEntry {
        currency: "USD".to_string(),
        rate: dec("17.25"),
        date: None,
    }];
    config
}

pub fn line(index: usize) -> LineItem {
    LineItem::new(
        format!("[P{index}] Wooden board {index}"),
        dec("2"),
        dec("10.50"),
        dec("3.36"),
    )
    .with_product_code(format!("P{index}"))
    .with_unit("PZA")
    .with_category("Boards")
}

pub fn order(key: &str, company: &str, line_count: usize) -> SourceRecord {
    let mut record = SourceRecord::new(key, DocumentKind::Order, company, "USD");
    record.state = DocumentState::Posted;
    record.partner = Some("Client".to_string());
    record.date = Some(date(2024, 3, 15));
    record.payment_term = Some("30 days net".to_string());
    record.external_reference = Some("PO-9".to_string());
    record.linked_invoice = Some(InvoiceRef {
        number: format!("INV/{key}"),
        date: Some(date(2024, 3, 16)),
    });
    for index in 1..=line_count {
        record = record.with_line(line(index));
    }
    record
}

pub fn invoice(key: &str, company: &str, origin: &str) -> SourceRecord {
    let mut record = SourceRecord::new(key, DocumentKind::Invoice, company, "MXN");
    record.state = DocumentState::Posted;
    record.partner = Some("Client".to_string());
    record.partner_tax_id = Some("XAXX010101000".to_string());
    record.date = Some(date(2024, 3, 16));
    record.payment_term = Some("Inmediato".to_string());
    record.origin = Some(origin.to_string());
    record.with_line(line(1))
}

/// Every configured worksheet, each holding only its header row.
pub fn spreadsheet() -> MemorySpreadsheet {
    let sheets = [
        ("Orders", &Schema::ORDER),
        ("ORD-A", &Schema::ORDER),
        ("ORD-G", &Schema::ORDER),
        ("Invoices", &Schema::INVOICE),
        ("INV-A", &Schema::INVOICE),
    ]
    .into_iter()
    .map(|(name, schema)| MemoryWorksheet::with_rows(name, vec![schema.header_row()]))
    .collect();
    MemorySpreadsheet::from_sheets("memory://sales", sheets)
}

pub fn rows_of(spreadsheet: &MemorySpreadsheet, name: &str) -> Vec<Row> {
    spreadsheet
        .sheet(name)
        .expect("worksheet exists")
        .rows()
        .cloned()
        .collect()
}

/// Key-column values of a worksheet, header included.
pub fn keys_of(spreadsheet: &MemorySpreadsheet, name: &str, schema: &Schema) -> Vec<String> {
    rows_of(spreadsheet, name)
        .into_iter()
        .map(|row| row.get(schema.key_index).cloned().unwrap_or_default())
        .collect()
}
