//! Projection of a source record into its destination row group.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::salesheet::tools::config::SyncConfig;
use crate::salesheet::tools::derive::{
    CreditLabel, DerivedFields, RateProvider, category_label, clean_description, electronic_invoice_uuid,
    family_label,
};
use crate::salesheet::tools::model::{
    Degradation, DerivedValue, DocumentKind, LineItem, Row, RowGroup, SourceRecord,
};

const MONEY_PLACES: u32 = 2;
const RATE_PLACES: u32 = 6;

/// A destination column. Schemas are fixed orderings of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    DocumentNumber,
    Month,
    IssueDate,
    DueDate,
    InternalOrderNumber,
    ExternalReference,
    DeliveryMethod,
    CustomerName,
    CustomerTaxId,
    ProductCode,
    Description,
    Quantity,
    Unit,
    UnitPrice,
    Subtotal,
    Tax,
    Total,
    CurrencyName,
    ConversionRate,
    TotalBase,
    CreditDays,
    CreditLabel,
    Category,
    Family,
    Status,
    ElectronicInvoiceUuid,
    OriginReference,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::DocumentNumber => "Invoice",
            Column::Month => "Month",
            Column::IssueDate => "Issue Date",
            Column::DueDate => "Due Date",
            Column::InternalOrderNumber => "Internal Order",
            Column::ExternalReference => "Customer PO",
            Column::DeliveryMethod => "Delivery",
            Column::CustomerName => "Customer",
            Column::CustomerTaxId => "Tax ID",
            Column::ProductCode => "Product Code",
            Column::Description => "Description",
            Column::Quantity => "Quantity",
            Column::Unit => "Unit",
            Column::UnitPrice => "Unit Price",
            Column::Subtotal => "Subtotal",
            Column::Tax => "Tax",
            Column::Total => "Total",
            Column::CurrencyName => "Currency",
            Column::ConversionRate => "Exchange Rate",
            Column::TotalBase => "Total (Base)",
            Column::CreditDays => "Credit Days",
            Column::CreditLabel => "Credit/Cash",
            Column::Category => "Category",
            Column::Family => "Family",
            Column::Status => "Status",
            Column::ElectronicInvoiceUuid => "UUID",
            Column::OriginReference => "Origin",
        }
    }
}

const ORDER_COLUMNS: [Column; 23] = [
    Column::DocumentNumber,
    Column::Month,
    Column::IssueDate,
    Column::InternalOrderNumber,
    Column::ExternalReference,
    Column::DeliveryMethod,
    Column::CustomerName,
    Column::ProductCode,
    Column::Description,
    Column::Quantity,
    Column::Unit,
    Column::UnitPrice,
    Column::Subtotal,
    Column::Tax,
    Column::Total,
    Column::CurrencyName,
    Column::ConversionRate,
    Column::TotalBase,
    Column::CreditDays,
    Column::CreditLabel,
    Column::Category,
    Column::Family,
    Column::Status,
];

const INVOICE_COLUMNS: [Column; 26] = [
    Column::DocumentNumber,
    Column::Month,
    Column::IssueDate,
    Column::DueDate,
    Column::ExternalReference,
    Column::DeliveryMethod,
    Column::CustomerName,
    Column::CustomerTaxId,
    Column::ProductCode,
    Column::Description,
    Column::Quantity,
    Column::Unit,
    Column::UnitPrice,
    Column::Subtotal,
    Column::Tax,
    Column::Total,
    Column::CurrencyName,
    Column::ConversionRate,
    Column::TotalBase,
    Column::CreditDays,
    Column::CreditLabel,
    Column::Category,
    Column::Family,
    Column::Status,
    Column::ElectronicInvoiceUuid,
    Column::OriginReference,
];

/// Positional layout of the rows written for one document kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub kind: DocumentKind,
    pub columns: &'static [Column],
    /// 0-based index of the column holding the record key.
    pub key_index: usize,
    pub date_format: &'static str,
}

impl Schema {
    pub const ORDER: Schema = Schema {
        kind: DocumentKind::Order,
        columns: &ORDER_COLUMNS,
        key_index: 3,
        date_format: "%Y-%m-%d",
    };

    pub const INVOICE: Schema = Schema {
        kind: DocumentKind::Invoice,
        columns: &INVOICE_COLUMNS,
        key_index: 0,
        date_format: "%d/%m/%Y",
    };

    pub fn for_kind(kind: DocumentKind) -> &'static Schema {
        match kind {
            DocumentKind::Order => &Self::ORDER,
            DocumentKind::Invoice => &Self::INVOICE,
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// 1-based key column, as addressed by the destination store.
    pub fn key_column(&self) -> usize {
        self.key_index + 1
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn header_row(&self) -> Row {
        self.columns
            .iter()
            .map(|column| column.header().to_string())
            .collect()
    }
}

/// Configuration slice the projector needs.
#[derive(Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub base_currency: &'a str,
    pub rates: &'a dyn RateProvider,
    pub keywords: &'a [String],
    pub delivery_method: &'a str,
    pub status_marker: &'a str,
}

impl<'a> ProjectionContext<'a> {
    pub fn new(config: &'a SyncConfig, rates: &'a dyn RateProvider) -> Self {
        Self {
            base_currency: &config.base_currency,
            rates,
            keywords: &config.manufacturing_keywords,
            delivery_method: &config.delivery_method,
            status_marker: &config.status_marker,
        }
    }
}

/// Row group of a record plus the fields that degraded while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub group: RowGroup,
    pub degradations: Vec<Degradation>,
}

/// Projects the record's product lines, in order, into rows of `schema`.
///
/// Every row has exactly `schema.width()` cells; anything that cannot be
/// computed is written as the `NeedsVerification` sentinel.
#[instrument(level = "debug", skip_all, fields(key = %record.key))]
pub fn project(record: &SourceRecord, schema: &Schema, context: &ProjectionContext<'_>) -> Projection {
    let cells = RecordCells::new(record, schema, context);

    let rows: Vec<Row> = record
        .product_lines()
        .map(|line| {
            schema
                .columns
                .iter()
                .map(|column| cells.cell(*column, line).render())
                .collect()
        })
        .collect();

    debug!(row_count = rows.len(), degraded = cells.degradations.len(), "record projected");
    Projection {
        group: RowGroup::new(record.key.clone(), rows),
        degradations: cells.degradations,
    }
}

/// Record-level values shared by every row of the group.
struct RecordCells<'r, 'c> {
    record: &'r SourceRecord,
    schema: &'r Schema,
    context: &'r ProjectionContext<'c>,
    document_number: DerivedValue,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    derived: DerivedFields,
    uuid: DerivedValue,
    /// Lines whose base-currency total exceeds the decimal range.
    base_overflow: usize,
    degradations: Vec<Degradation>,
}

impl<'r, 'c> RecordCells<'r, 'c> {
    fn new(record: &'r SourceRecord, schema: &'r Schema, context: &'r ProjectionContext<'c>) -> Self {
        let (document_number, issue_date) = match record.kind {
            DocumentKind::Invoice => (DerivedValue::text(record.key.clone()), record.date),
            DocumentKind::Order => match &record.linked_invoice {
                Some(invoice) => (
                    DerivedValue::required(Some(invoice.number.as_str())),
                    invoice.date.or(record.date),
                ),
                None => (DerivedValue::NeedsVerification, record.date),
            },
        };
        let derived = DerivedFields::compute(record, context.base_currency, context.rates, issue_date);

        let mut cells = Self {
            record,
            schema,
            context,
            document_number,
            issue_date,
            due_date: record.due_date.or(issue_date),
            derived,
            uuid: electronic_invoice_uuid(record.electronic_invoice_uuid.as_deref()),
            base_overflow: 0,
            degradations: Vec::new(),
        };
        let base_overflow = record
            .product_lines()
            .filter(|line| cells.total_base(line).is_none())
            .count();
        cells.base_overflow = base_overflow;
        cells.collect_degradations();
        cells
    }

    fn collect_degradations(&mut self) {
        let key = &self.record.key;
        let mut found = Vec::new();

        if self.schema.has(Column::DocumentNumber) && self.document_number.needs_verification() {
            found.push(Degradation::new(key, "document_number", "no invoice linked to the record"));
        }
        if self.issue_date.is_none() {
            found.push(Degradation::new(key, "issue_date", "record has no document date"));
        }
        if self.schema.has(Column::CustomerName) && is_blank(self.record.partner.as_deref()) {
            found.push(Degradation::new(key, "customer", "record has no customer"));
        }
        if self.schema.has(Column::CustomerTaxId) && is_blank(self.record.partner_tax_id.as_deref()) {
            found.push(Degradation::new(key, "customer_tax_id", "customer has no tax ID"));
        }
        if self.schema.has(Column::ExternalReference)
            && is_blank(self.record.external_reference.as_deref())
        {
            found.push(Degradation::new(
                key,
                "external_reference",
                "record has no customer reference",
            ));
        }
        if self.derived.credit_days.to_value().needs_verification() {
            let detail = match &self.record.payment_term {
                Some(term) => format!("payment term '{term}' has no credit days"),
                None => "record has no payment term".to_string(),
            };
            found.push(Degradation::new(key, "credit_days", detail));
        }
        if let Some(error) = &self.derived.conversion.degraded {
            found.push(Degradation::new(
                key,
                "conversion_rate",
                format!("{error}; rate 1 used"),
            ));
        }
        if self.schema.has(Column::TotalBase) && self.base_overflow > 0 {
            found.push(Degradation::new(
                key,
                "total_base",
                format!(
                    "{} line total(s) overflow at rate {}",
                    self.base_overflow, self.derived.conversion.rate
                ),
            ));
        }
        if self.schema.has(Column::ElectronicInvoiceUuid) && self.uuid.needs_verification() {
            found.push(Degradation::new(key, "electronic_invoice_uuid", "malformed UUID"));
        }
        self.degradations = found;
    }

    fn date(&self, date: Option<NaiveDate>) -> DerivedValue {
        date.map_or(DerivedValue::NeedsVerification, |date| {
            DerivedValue::text(date.format(self.schema.date_format).to_string())
        })
    }

    fn money(value: Decimal) -> DerivedValue {
        DerivedValue::fixed(value, MONEY_PLACES)
    }

    fn total_base(&self, line: &LineItem) -> Option<Decimal> {
        line.total.checked_mul(self.derived.conversion.rate)
    }

    fn cell(&self, column: Column, line: &LineItem) -> DerivedValue {
        let record = self.record;
        match column {
            Column::DocumentNumber => self.document_number.clone(),
            Column::Month => self
                .issue_date
                .map_or(DerivedValue::NeedsVerification, |date| {
                    DerivedValue::fixed(Decimal::from(date.month()), 0)
                }),
            Column::IssueDate => self.date(self.issue_date),
            Column::DueDate => self.date(self.due_date),
            Column::InternalOrderNumber => DerivedValue::text(record.key.clone()),
            Column::ExternalReference => DerivedValue::required(record.external_reference.as_deref()),
            Column::DeliveryMethod => DerivedValue::text(self.context.delivery_method),
            Column::CustomerName => DerivedValue::required(record.partner.as_deref()),
            Column::CustomerTaxId => DerivedValue::required(record.partner_tax_id.as_deref()),
            Column::ProductCode => DerivedValue::text(line.product_code.clone().unwrap_or_default()),
            Column::Description => DerivedValue::Text(clean_description(&line.description)),
            Column::Quantity => DerivedValue::exact(line.quantity),
            Column::Unit => DerivedValue::text(line.unit.clone().unwrap_or_default()),
            Column::UnitPrice => Self::money(line.unit_price),
            Column::Subtotal => Self::money(line.subtotal),
            Column::Tax => Self::money(line.tax),
            Column::Total => Self::money(line.total),
            Column::CurrencyName => DerivedValue::text(self.derived.currency_name.clone()),
            Column::ConversionRate => DerivedValue::fixed(self.derived.conversion.rate, RATE_PLACES),
            Column::TotalBase => self
                .total_base(line)
                .map_or(DerivedValue::NeedsVerification, Self::money),
            Column::CreditDays => self.derived.credit_days.to_value(),
            Column::CreditLabel => match self.derived.credit_label {
                CreditLabel::NeedsVerification => DerivedValue::NeedsVerification,
                label => DerivedValue::text(label.as_str()),
            },
            Column::Category => DerivedValue::text(
                category_label(&clean_description(&line.description), self.context.keywords).as_str(),
            ),
            Column::Family => DerivedValue::Text(family_label(line.category.as_deref())),
            Column::Status => DerivedValue::text(self.context.status_marker),
            Column::ElectronicInvoiceUuid => self.uuid.clone(),
            Column::OriginReference => DerivedValue::text(record.origin.clone().unwrap_or_default()),
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}
