use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::salesheet::tools::error::{Result, ToolError};
use crate::salesheet::tools::model::{DocumentKind, DocumentState, InvoiceRef, SourceRecord};

/// Filter understood by a records store. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub kind: Option<DocumentKind>,
    pub origin: Option<String>,
    pub state: Option<DocumentState>,
}

impl RecordFilter {
    pub fn kind(kind: DocumentKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &SourceRecord) -> bool {
        self.kind.is_none_or(|kind| record.kind == kind)
            && self.state.is_none_or(|state| record.state == state)
            && self
                .origin
                .as_deref()
                .is_none_or(|origin| record.origin.as_deref() == Some(origin))
    }
}

/// Read-only query interface of the business-records store.
pub trait RecordSource {
    fn query(&self, filter: &RecordFilter) -> Result<Vec<SourceRecord>>;
}

/// Records store backed by a JSON export.
#[derive(Debug, Clone, Default)]
pub struct JsonRecordSource {
    records: Vec<SourceRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordExport {
    Wrapped { records: Vec<SourceRecord> },
    Bare(Vec<SourceRecord>),
}

impl JsonRecordSource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }

    /// Loads `[...]` or `{"records": [...]}` exports.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let source = fs::read_to_string(path)?;
        let records = match serde_json::from_str::<RecordExport>(&source)? {
            RecordExport::Wrapped { records } | RecordExport::Bare(records) => records,
        };
        for record in &records {
            validate_record(record)?;
        }
        info!(record_count = records.len(), "records loaded");
        Ok(Self { records })
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }
}

impl RecordSource for JsonRecordSource {
    fn query(&self, filter: &RecordFilter) -> Result<Vec<SourceRecord>> {
        let matched: Vec<SourceRecord> = self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        debug!(?filter, matched = matched.len(), "records queried");
        Ok(matched)
    }
}

fn validate_record(record: &SourceRecord) -> Result<()> {
    if record.key.trim().is_empty() {
        return Err(ToolError::InvalidRecord {
            key: record.key.clone(),
            reason: "record key is empty".to_string(),
        });
    }
    if record.currency.trim().is_empty() {
        return Err(ToolError::InvalidRecord {
            key: record.key.clone(),
            reason: "currency is empty".to_string(),
        });
    }
    Ok(())
}

/// Fills in the invoice issued for each order that does not carry one: the
/// first posted invoice whose origin is the order key.
#[instrument(level = "info", skip_all, fields(record_count = records.len()))]
pub fn resolve_linked_invoices(
    records: Vec<SourceRecord>,
    source: &dyn RecordSource,
) -> Result<Vec<SourceRecord>> {
    let mut resolved = Vec::with_capacity(records.len());
    for mut record in records {
        if record.kind == DocumentKind::Order && record.linked_invoice.is_none() {
            let filter = RecordFilter {
                kind: Some(DocumentKind::Invoice),
                origin: Some(record.key.clone()),
                state: Some(DocumentState::Posted),
            };
            if let Some(invoice) = source.query(&filter)?.into_iter().next() {
                debug!(order = %record.key, invoice = %invoice.key, "linked invoice resolved");
                record.linked_invoice = Some(InvoiceRef {
                    number: invoice.key,
                    date: invoice.date,
                });
            }
        }
        resolved.push(record);
    }
    Ok(resolved)
}
