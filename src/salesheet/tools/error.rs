use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the fatal failure cases of a synchronization run.
///
/// Per-record problems such as an unparseable payment term or a missing
/// exchange rate are not represented here; they degrade into
/// [`Degradation`](crate::salesheet::tools::model::Degradation) entries on the report.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when the invocation configuration is missing or invalid. Always
    /// raised before the destination store is contacted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Raised when the destination spreadsheet itself cannot be located.
    #[error("spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),

    /// Raised when a worksheet name does not resolve inside the spreadsheet.
    #[error("worksheet '{worksheet}' not found in spreadsheet {spreadsheet}")]
    DestinationNotFound {
        spreadsheet: String,
        worksheet: String,
    },

    /// Raised when the key column snapshot cannot be read.
    #[error("failed to read key column of worksheet '{worksheet}': {source}")]
    StoreRead {
        worksheet: String,
        #[source]
        source: StoreError,
    },

    /// Raised when a row mutation fails mid-batch. Mutations completed before
    /// the failure stay in place.
    #[error("{operation} failed on worksheet '{worksheet}' for key {key}: {source}")]
    StoreWrite {
        worksheet: String,
        key: String,
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Raised when a source record cannot be loaded into the internal model.
    #[error("invalid record {key}: {reason}")]
    InvalidRecord { key: String, reason: String },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Failures reported by a destination store for a single operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("row position {position} is outside 1..={limit}")]
    PositionOutOfRange { position: usize, limit: usize },

    #[error("column index {0} is invalid, columns are 1-based")]
    InvalidColumn(usize),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the exchange-rate collaborator. These never abort a sync; the
/// caller falls back to a rate of one and records the degradation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLookupError {
    #[error("no exchange rate configured for {from} -> {to}")]
    UnknownPair { from: String, to: String },

    #[error("no exchange rate for {from} -> {to} on or before {date}")]
    NoRateForDate {
        from: String,
        to: String,
        date: NaiveDate,
    },

    #[error("exchange rate for {currency} is not positive")]
    NonPositive { currency: String },
}
