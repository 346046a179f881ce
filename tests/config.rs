use std::fs;

use salesheet_tools::config::SyncConfig;
use salesheet_tools::model::DocumentKind;
use salesheet_tools::route::{CompanyMapping, resolve_worksheet, validate_sheet_name};
use salesheet_tools::ToolError;
use tempfile::tempdir;

#[test]
fn loads_minimal_config_with_defaults() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("config.json");
    let config = serde_json::json!({
        "spreadsheet": "sales.xlsx",
        "order_worksheet": "Orders",
        "invoice_worksheet": "Invoices",
        "order_mapping": "{\"Acme\": \"ORD-A\"}",
        "rates": [{"currency": "USD", "rate": "17.25"}]
    });
    fs::write(&path, config.to_string()).expect("config written");

    let config = SyncConfig::from_path(&path).expect("config loaded");

    assert_eq!(config.base_currency, "MXN");
    assert_eq!(config.delivery_method, "DOMICILIO");
    assert_eq!(config.status_marker, "PENDING");
    assert!(config.manufacturing_keywords.contains(&"módulo".to_string()));
    assert_eq!(config.default_worksheet(DocumentKind::Invoice), "Invoices");
    assert_eq!(config.mapping_for(DocumentKind::Order).resolve("Acme"), "ORD-A");
    assert_eq!(config.mapping_for(DocumentKind::Invoice).resolve("Acme"), "Invoices");
    assert_eq!(config.rate_table().base(), "MXN");
}

#[test]
fn invalid_configs_are_rejected() {
    let temp_dir = tempdir().expect("temporary directory");
    assert!(matches!(
        SyncConfig::from_path(&temp_dir.path().join("absent.json")),
        Err(ToolError::MissingInput(_))
    ));

    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"spreadsheet": "sales.xlsx"}"#).expect("config written");
    assert!(matches!(
        SyncConfig::from_path(&path),
        Err(ToolError::Configuration(_))
    ));

    let mut config = SyncConfig::new("", "Orders", "Invoices");
    assert!(matches!(config.validate(), Err(ToolError::Configuration(_))));

    config.spreadsheet = "sales.xlsx".to_string();
    config.order_worksheet = "Orders [2024]".to_string();
    assert!(matches!(config.validate(), Err(ToolError::Configuration(_))));

    config.order_worksheet = "Orders".to_string();
    config.credentials = Some("[1, 2]".to_string());
    assert!(matches!(config.validate(), Err(ToolError::Configuration(_))));

    config.credentials = Some(r#"{"token": "secret"}"#.to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn sheet_names_follow_spreadsheet_rules() {
    assert!(validate_sheet_name("ORD-A").is_ok());
    assert!(validate_sheet_name("").is_err());
    assert!(validate_sheet_name("a:b").is_err());
    assert!(validate_sheet_name(&"x".repeat(32)).is_err());
    assert!(validate_sheet_name(&"x".repeat(31)).is_ok());
}

#[test]
fn mapping_falls_back_to_default() {
    let mapping = CompanyMapping::parse(Some(r#"{"Acme": " ORD-A "}"#), "Orders");
    assert_eq!(resolve_worksheet("Acme", &mapping), "ORD-A");
    assert_eq!(resolve_worksheet("Unknown", &mapping), "Orders");
    assert_eq!(resolve_worksheet("acme", &mapping), "Orders");
}

#[test]
fn malformed_mapping_degrades_to_default_only() {
    for text in ["{not json", "[\"Acme\"]", "", "null"] {
        let mapping = CompanyMapping::parse(Some(text), "Orders");
        assert!(mapping.is_empty(), "{text} should yield an empty mapping");
        assert_eq!(mapping.resolve("Acme"), "Orders");
    }
    assert!(CompanyMapping::parse(None, "Orders").is_empty());
}

#[test]
fn invalid_mapping_entries_are_dropped() {
    let mapping = CompanyMapping::parse(
        Some(r#"{"Acme": "ORD-A", "Globex": 7, "Initech": "a/b", "Hooli": ""}"#),
        "Orders",
    );
    assert_eq!(mapping.len(), 1);
    assert_eq!(mapping.resolve("Globex"), "Orders");
    assert_eq!(mapping.worksheets(), vec!["Orders", "ORD-A"]);
}
