use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::salesheet::tools::config::SyncConfig;
use crate::salesheet::tools::derive::RateProvider;
use crate::salesheet::tools::error::{Result, ToolError};
use crate::salesheet::tools::io::records::{RecordFilter, RecordSource, resolve_linked_invoices};
use crate::salesheet::tools::io::store::{Spreadsheet, WriteMode};
use crate::salesheet::tools::model::{Degradation, DocumentKind, RowGroup, SourceRecord};
use crate::salesheet::tools::project::{ProjectionContext, Schema, project};
use crate::salesheet::tools::reconcile::{Reconciler, WorksheetOutcome};

/// Summary of one sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub kind: DocumentKind,
    pub records_processed: usize,
    pub rows_appended: usize,
    pub rows_replaced_old: usize,
    pub rows_replaced_new: usize,
    pub any_change: bool,
    pub per_worksheet: Vec<WorksheetOutcome>,
    pub degradations: Vec<Degradation>,
}

impl SyncReport {
    /// Report for an invocation whose filtered input was empty.
    pub fn nothing_to_do(kind: DocumentKind) -> Self {
        Self {
            kind,
            records_processed: 0,
            rows_appended: 0,
            rows_replaced_old: 0,
            rows_replaced_new: 0,
            any_change: false,
            per_worksheet: Vec::new(),
            degradations: Vec::new(),
        }
    }

    fn push(&mut self, outcome: WorksheetOutcome) {
        self.rows_appended += outcome.appended_rows;
        self.rows_replaced_old += outcome.replaced_rows_old;
        self.rows_replaced_new += outcome.replaced_rows_new;
        self.any_change |= outcome.any_change();
        self.per_worksheet.push(outcome);
    }

    pub fn title(&self) -> &'static str {
        if self.any_change {
            "Extraction Successful"
        } else {
            "No New Data"
        }
    }

    pub fn message(&self) -> String {
        if self.records_processed == 0 {
            return format!("No {}s selected.", self.kind);
        }
        if !self.any_change {
            return format!("All selected {}s are up to date.", self.kind);
        }
        format!(
            "{} {}(s) exported: {} row(s) appended, {} row(s) replaced by {}.",
            self.records_processed,
            self.kind,
            self.rows_appended,
            self.rows_replaced_old,
            self.rows_replaced_new
        )
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.title(), self.message())?;
        for outcome in &self.per_worksheet {
            writeln!(
                f,
                "  {} [{}]: +{} appended, {} -> {} replaced",
                outcome.worksheet,
                outcome.companies.join(", "),
                outcome.appended_rows,
                outcome.replaced_rows_old,
                outcome.replaced_rows_new
            )?;
        }
        for degradation in &self.degradations {
            writeln!(
                f,
                "  needs verification: {} {} ({})",
                degradation.key, degradation.field, degradation.detail
            )?;
        }
        Ok(())
    }
}

/// Records routed to one worksheet, possibly from several companies.
struct WorksheetBatch<'r> {
    companies: Vec<String>,
    records: Vec<&'r SourceRecord>,
}

/// Synchronizes the records of `kind` into the spreadsheet.
///
/// Records are grouped by company, routed to worksheets, projected and
/// reconciled one worksheet at a time. Every target worksheet is resolved
/// before the first mutation, so a missing worksheet aborts the invocation
/// without touching the store. A store failure mid-batch aborts too; what
/// was already written is committed and left in place.
#[instrument(level = "info", skip_all, fields(kind = %kind, spreadsheet = %store.location()))]
pub fn sync(
    records: &[SourceRecord],
    kind: DocumentKind,
    config: &SyncConfig,
    rates: &dyn RateProvider,
    store: &mut dyn Spreadsheet,
) -> Result<SyncReport> {
    let selected: Vec<&SourceRecord> = records.iter().filter(|record| record.kind == kind).collect();
    if selected.len() < records.len() {
        debug!(skipped = records.len() - selected.len(), "records of another kind ignored");
    }
    if selected.is_empty() {
        info!("no records to synchronize");
        return Ok(SyncReport::nothing_to_do(kind));
    }
    if let Some(blank) = selected.iter().find(|record| record.key.trim().is_empty()) {
        return Err(ToolError::InvalidRecord {
            key: blank.key.clone(),
            reason: format!("{kind} without a key in company '{}'", blank.company),
        });
    }

    let batches = route_batches(&selected, kind, config);
    for worksheet in batches.keys() {
        store.worksheet(worksheet)?;
    }

    let schema = Schema::for_kind(kind);
    let context = ProjectionContext::new(config, rates);
    let mut report = SyncReport::nothing_to_do(kind);
    report.records_processed = selected.len();

    for (worksheet, batch) in batches {
        warn_shared_keys(&worksheet, &batch.records);
        let mut groups: Vec<RowGroup> = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            let projection = project(record, schema, &context);
            for degradation in &projection.degradations {
                warn!(
                    key = %degradation.key,
                    field = degradation.field,
                    detail = %degradation.detail,
                    "field needs verification"
                );
            }
            report.degradations.extend(projection.degradations);
            groups.push(projection.group);
        }

        info!(
            worksheet = %worksheet,
            companies = ?batch.companies,
            records = groups.len(),
            "reconciling worksheet"
        );
        let applied = store.worksheet(&worksheet).and_then(|sheet| {
            Reconciler::new(sheet, schema.key_column())
                .with_mode(WriteMode::UserEntered)
                .apply(groups)
        });
        match applied {
            Ok(mut outcome) => {
                outcome.companies = batch.companies;
                report.push(outcome);
            }
            Err(err) => {
                error!(worksheet = %worksheet, error = %err, "worksheet sync failed");
                if let Err(commit_err) = store.commit() {
                    error!(error = %commit_err, "failed to persist partial changes");
                }
                return Err(err);
            }
        }
    }

    store.commit()?;
    info!(
        records = report.records_processed,
        appended = report.rows_appended,
        replaced_old = report.rows_replaced_old,
        replaced_new = report.rows_replaced_new,
        "sync finished"
    );
    Ok(report)
}

/// Queries the records of `kind` from `source`, links orders to their
/// invoices and synchronizes the result.
pub fn sync_from_source(
    source: &dyn RecordSource,
    kind: DocumentKind,
    config: &SyncConfig,
    rates: &dyn RateProvider,
    store: &mut dyn Spreadsheet,
) -> Result<SyncReport> {
    let records = source.query(&RecordFilter::kind(kind))?;
    let records = resolve_linked_invoices(records, source)?;
    sync(&records, kind, config, rates, store)
}

/// Records of different companies that share a key and a worksheet collapse
/// into one row group, so only the later company's rows are written.
fn warn_shared_keys(worksheet: &str, records: &[&SourceRecord]) {
    let mut owners: IndexMap<&str, &str> = IndexMap::with_capacity(records.len());
    for record in records {
        let previous = owners.insert(record.key.as_str(), record.company.as_str());
        if let Some(previous) = previous.filter(|previous| *previous != record.company) {
            warn!(
                worksheet = %worksheet,
                key = %record.key,
                dropped_company = %previous,
                kept_company = %record.company,
                "two companies share a key in one worksheet, keeping the later record"
            );
        }
    }
}

/// Groups records by company, in first-seen order, and merges companies that
/// route to the same worksheet into one batch.
fn route_batches<'r>(
    records: &[&'r SourceRecord],
    kind: DocumentKind,
    config: &SyncConfig,
) -> IndexMap<String, WorksheetBatch<'r>> {
    let mapping = config.mapping_for(kind);

    let mut by_company: IndexMap<&str, Vec<&'r SourceRecord>> = IndexMap::new();
    for record in records {
        by_company.entry(record.company.as_str()).or_default().push(*record);
    }
    info!(companies = ?by_company.keys().collect::<Vec<_>>(), "records grouped by company");

    let mut batches: IndexMap<String, WorksheetBatch<'r>> = IndexMap::new();
    for (company, company_records) in by_company {
        let worksheet = mapping.resolve(company).to_string();
        let batch = batches.entry(worksheet).or_insert_with(|| WorksheetBatch {
            companies: Vec::new(),
            records: Vec::new(),
        });
        batch.companies.push(company.to_string());
        batch.records.extend(company_records);
    }
    batches
}
