mod common;

use std::fs;

use common::{date, dec, invoice, order};
use salesheet_tools::io::records::{
    JsonRecordSource, RecordFilter, RecordSource, resolve_linked_invoices,
};
use salesheet_tools::model::{DocumentKind, DocumentState};
use salesheet_tools::ToolError;
use tempfile::tempdir;

#[test]
fn loads_wrapped_export_with_defaults() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("records.json");
    let export = serde_json::json!({
        "records": [
            {
                "key": "SO-100",
                "kind": "order",
                "state": "posted",
                "company": "Acme",
                "currency": "USD",
                "date": "2024-03-15",
                "payment_term": "30 days net",
                "lines": [
                    {
                        "description": "[BRD-1] Wooden board",
                        "quantity": "2",
                        "unit_price": "10.50",
                        "subtotal": "21.00",
                        "tax": "3.36",
                        "total": "24.36"
                    },
                    {
                        "description": "Notes",
                        "quantity": "0",
                        "unit_price": "0",
                        "subtotal": "0",
                        "tax": "0",
                        "total": "0",
                        "display_only": true
                    }
                ]
            }
        ]
    });
    fs::write(&path, export.to_string()).expect("export written");

    let source = JsonRecordSource::from_path(&path).expect("records loaded");

    let records = source.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.kind, DocumentKind::Order);
    assert_eq!(record.state, DocumentState::Posted);
    assert_eq!(record.date, Some(date(2024, 3, 15)));
    assert_eq!(record.lines[0].total, dec("24.36"));
    assert!(record.linked_invoice.is_none());
    assert_eq!(record.product_lines().count(), 1);
}

#[test]
fn loads_bare_array_export() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("records.json");
    let records = vec![order("SO-1", "Acme", 1), invoice("INV/1", "Acme", "SO-1")];
    fs::write(&path, serde_json::to_string(&records).expect("serialized")).expect("written");

    let source = JsonRecordSource::from_path(&path).expect("records loaded");

    assert_eq!(source.records(), records.as_slice());
}

#[test]
fn rejects_missing_files_and_blank_keys() {
    let temp_dir = tempdir().expect("temporary directory");
    let missing = temp_dir.path().join("absent.json");
    assert!(matches!(
        JsonRecordSource::from_path(&missing),
        Err(ToolError::MissingInput(_))
    ));

    let path = temp_dir.path().join("records.json");
    let blank = serde_json::json!([
        {"key": " ", "kind": "invoice", "company": "Acme", "currency": "MXN"}
    ]);
    fs::write(&path, blank.to_string()).expect("written");
    assert!(matches!(
        JsonRecordSource::from_path(&path),
        Err(ToolError::InvalidRecord { .. })
    ));
}

#[test]
fn filters_by_kind_origin_and_state() {
    let mut draft = invoice("INV/2", "Acme", "SO-1");
    draft.state = DocumentState::Draft;
    let source = JsonRecordSource::new(vec![
        order("SO-1", "Acme", 1),
        invoice("INV/1", "Acme", "SO-1"),
        draft,
        invoice("INV/3", "Acme", "SO-9"),
    ]);

    let orders = source
        .query(&RecordFilter::kind(DocumentKind::Order))
        .expect("queried");
    assert_eq!(orders.len(), 1);

    let for_order = source
        .query(&RecordFilter {
            kind: Some(DocumentKind::Invoice),
            origin: Some("SO-1".to_string()),
            state: None,
        })
        .expect("queried");
    let keys: Vec<&str> = for_order.iter().map(|record| record.key.as_str()).collect();
    assert_eq!(keys, vec!["INV/1", "INV/2"]);

    assert_eq!(source.query(&RecordFilter::default()).expect("queried").len(), 4);
}

#[test]
fn linked_invoice_is_first_posted_invoice_for_order() {
    let mut pending = order("SO-1", "Acme", 1);
    pending.linked_invoice = None;
    let mut orphan = order("SO-2", "Acme", 1);
    orphan.linked_invoice = None;
    let already_linked = order("SO-3", "Acme", 1);

    let mut draft = invoice("INV/DRAFT", "Acme", "SO-1");
    draft.state = DocumentState::Draft;
    let mut posted = invoice("INV/0001", "Acme", "SO-1");
    posted.date = Some(date(2024, 4, 2));
    let source = JsonRecordSource::new(vec![
        draft,
        posted,
        invoice("INV/0002", "Acme", "SO-1"),
        invoice("INV/0003", "Acme", "SO-3"),
    ]);

    let resolved = resolve_linked_invoices(vec![pending, orphan, already_linked], &source)
        .expect("resolved");

    let first = resolved[0].linked_invoice.as_ref().expect("linked");
    assert_eq!(first.number, "INV/0001");
    assert_eq!(first.date, Some(date(2024, 4, 2)));
    assert!(resolved[1].linked_invoice.is_none());
    assert_eq!(
        resolved[2].linked_invoice.as_ref().map(|invoice| invoice.number.as_str()),
        Some("INV/SO-3")
    );
}
