use std::fmt;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Natural business identifier of a record (order or invoice number). It is
/// also the value written to the destination key column.
pub type RecordKey = String;

/// One destination row: fixed-width, already formatted cells.
pub type Row = Vec<String>;

/// Text written in place of any value that could not be computed confidently.
pub const NEEDS_VERIFICATION: &str = "NeedsVerification";

/// Kind of commercial document a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Sale order.
    Order,
    /// Customer invoice.
    Invoice,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Order => write!(f, "order"),
            DocumentKind::Invoice => write!(f, "invoice"),
        }
    }
}

/// Workflow state of a record in the records store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    #[default]
    Draft,
    Posted,
    Cancelled,
}

/// Reference to the invoice issued for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRef {
    pub number: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// A single product line of a record. Line order defines row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub product_code: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Section and note lines carry no product and never become rows.
    #[serde(default)]
    pub display_only: bool,
}

impl LineItem {
    /// Builds a product line, deriving subtotal and total from the inputs.
    /// Amounts beyond the decimal range saturate instead of overflowing.
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal, tax: Decimal) -> Self {
        let subtotal = quantity.saturating_mul(unit_price);
        Self {
            product_code: None,
            description: description.into(),
            quantity,
            unit_price,
            subtotal,
            tax,
            total: subtotal.saturating_add(tax),
            unit: None,
            category: None,
            display_only: false,
        }
    }

    pub fn with_product_code(mut self, code: impl Into<String>) -> Self {
        self.product_code = Some(code.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A business document as exported by the records store. Treated as an
/// immutable snapshot for the duration of a sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub key: RecordKey,
    pub kind: DocumentKind,
    #[serde(default)]
    pub state: DocumentState,
    pub company: String,
    #[serde(default)]
    pub partner: Option<String>,
    #[serde(default)]
    pub partner_tax_id: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_term: Option<String>,
    /// Customer purchase-order reference.
    #[serde(default)]
    pub external_reference: Option<String>,
    /// For invoices, the order the invoice was issued from.
    #[serde(default)]
    pub origin: Option<String>,
    /// For orders, the invoice issued for the order.
    #[serde(default)]
    pub linked_invoice: Option<InvoiceRef>,
    #[serde(default)]
    pub electronic_invoice_uuid: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineItem>,
}

impl SourceRecord {
    /// Creates a record with the mandatory fields set and everything else empty.
    pub fn new(
        key: impl Into<RecordKey>,
        kind: DocumentKind,
        company: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            state: DocumentState::default(),
            company: company.into(),
            partner: None,
            partner_tax_id: None,
            currency: currency.into(),
            date: None,
            due_date: None,
            payment_term: None,
            external_reference: None,
            origin: None,
            linked_invoice: None,
            electronic_invoice_uuid: None,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    /// Lines that produce destination rows, in record order.
    pub fn product_lines(&self) -> impl Iterator<Item = &LineItem> {
        self.lines.iter().filter(|line| !line.display_only)
    }
}

/// Rows produced by one record, always written contiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroup {
    pub key: RecordKey,
    pub rows: Vec<Row>,
}

impl RowGroup {
    pub fn new(key: impl Into<RecordKey>, rows: Vec<Row>) -> Self {
        Self {
            key: key.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A derived cell before it is flattened to text at the projection boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedValue {
    /// Number rendered with a fixed number of decimals, or as the source
    /// value with trailing zeros removed when `places` is `None`.
    Numeric { value: Decimal, places: Option<u32> },
    Text(String),
    NeedsVerification,
}

impl DerivedValue {
    pub fn fixed(value: Decimal, places: u32) -> Self {
        DerivedValue::Numeric {
            value,
            places: Some(places),
        }
    }

    pub fn exact(value: Decimal) -> Self {
        DerivedValue::Numeric {
            value,
            places: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        DerivedValue::Text(value.into())
    }

    /// Text value, or the sentinel when the text is missing or blank.
    pub fn required(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(text) if !text.is_empty() => DerivedValue::Text(text.to_string()),
            _ => DerivedValue::NeedsVerification,
        }
    }

    pub fn needs_verification(&self) -> bool {
        matches!(self, DerivedValue::NeedsVerification)
    }

    /// Flattens the value into the deterministic cell text.
    pub fn render(&self) -> String {
        match self {
            DerivedValue::Numeric {
                value,
                places: Some(places),
            } => {
                let rounded =
                    value.round_dp_with_strategy(*places, RoundingStrategy::MidpointAwayFromZero);
                format!("{rounded:.prec$}", prec = *places as usize)
            }
            DerivedValue::Numeric { value, places: None } => value.normalize().to_string(),
            DerivedValue::Text(text) => text.clone(),
            DerivedValue::NeedsVerification => NEEDS_VERIFICATION.to_string(),
        }
    }
}

impl fmt::Display for DerivedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A derived field that could not be computed confidently for a record. The
/// affected cells carry the sentinel or a fallback value; the sync goes on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub key: RecordKey,
    pub field: &'static str,
    pub detail: String,
}

impl Degradation {
    pub fn new(key: impl Into<RecordKey>, field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field,
            detail: detail.into(),
        }
    }
}
