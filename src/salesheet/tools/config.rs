use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::salesheet::tools::derive::{RateEntry, RateTable};
use crate::salesheet::tools::error::{Result, ToolError};
use crate::salesheet::tools::model::DocumentKind;
use crate::salesheet::tools::route::{CompanyMapping, validate_sheet_name};

const DEFAULT_BASE_CURRENCY: &str = "MXN";
const DEFAULT_DELIVERY_METHOD: &str = "DOMICILIO";
const DEFAULT_STATUS_MARKER: &str = "PENDING";
const DEFAULT_KEYWORDS: [&str; 6] = ["board", "cone", "module", "tabla", "cono", "módulo"];

/// Invocation configuration, loaded once and passed explicitly to every
/// component of the sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Location of the destination spreadsheet.
    pub spreadsheet: String,
    pub order_worksheet: String,
    pub invoice_worksheet: String,
    /// Serialized `{"Company": "Worksheet"}` text for orders.
    #[serde(default)]
    pub order_mapping: Option<String>,
    /// Serialized `{"Company": "Worksheet"}` text for invoices.
    #[serde(default)]
    pub invoice_mapping: Option<String>,
    /// Credential bundle for the destination store, when it needs one.
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub rates: Vec<RateEntry>,
    #[serde(default = "default_keywords")]
    pub manufacturing_keywords: Vec<String>,
    #[serde(default = "default_delivery_method")]
    pub delivery_method: String,
    #[serde(default = "default_status_marker")]
    pub status_marker: String,
}

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|keyword| keyword.to_string()).collect()
}

fn default_delivery_method() -> String {
    DEFAULT_DELIVERY_METHOD.to_string()
}

fn default_status_marker() -> String {
    DEFAULT_STATUS_MARKER.to_string()
}

impl SyncConfig {
    /// Configuration with defaults for everything but the destination.
    pub fn new(
        spreadsheet: impl Into<String>,
        order_worksheet: impl Into<String>,
        invoice_worksheet: impl Into<String>,
    ) -> Self {
        Self {
            spreadsheet: spreadsheet.into(),
            order_worksheet: order_worksheet.into(),
            invoice_worksheet: invoice_worksheet.into(),
            order_mapping: None,
            invoice_mapping: None,
            credentials: None,
            base_currency: default_base_currency(),
            rates: Vec::new(),
            manufacturing_keywords: default_keywords(),
            delivery_method: default_delivery_method(),
            status_marker: default_status_marker(),
        }
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let source = fs::read_to_string(path)?;
        let config: SyncConfig = serde_json::from_str(&source)
            .map_err(|err| ToolError::Configuration(format!("{}: {err}", path.display())))?;
        config.validate()?;
        info!(path = %path.display(), spreadsheet = %config.spreadsheet, "configuration loaded");
        Ok(config)
    }

    /// Rejects configurations that cannot drive a sync. Mapping text is not
    /// checked here; it degrades to default-only routing instead.
    pub fn validate(&self) -> Result<()> {
        if self.spreadsheet.trim().is_empty() {
            return Err(ToolError::Configuration(
                "destination spreadsheet is not set".to_string(),
            ));
        }
        for (label, name) in [
            ("order_worksheet", &self.order_worksheet),
            ("invoice_worksheet", &self.invoice_worksheet),
        ] {
            validate_sheet_name(name)
                .map_err(|reason| ToolError::Configuration(format!("{label}: {reason}")))?;
        }
        if self.base_currency.trim().is_empty() {
            return Err(ToolError::Configuration("base currency is not set".to_string()));
        }
        if let Some(credentials) = &self.credentials {
            match serde_json::from_str::<Value>(credentials) {
                Ok(Value::Object(_)) => {}
                Ok(_) => {
                    return Err(ToolError::Configuration(
                        "credentials must be a JSON object".to_string(),
                    ));
                }
                Err(err) => {
                    return Err(ToolError::Configuration(format!(
                        "credentials are not valid JSON: {err}"
                    )));
                }
            }
        }
        debug!(rate_count = self.rates.len(), "configuration validated");
        Ok(())
    }

    pub fn default_worksheet(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Order => &self.order_worksheet,
            DocumentKind::Invoice => &self.invoice_worksheet,
        }
    }

    /// Company routing for the document kind, parsed from the mapping text.
    pub fn mapping_for(&self, kind: DocumentKind) -> CompanyMapping {
        let text = match kind {
            DocumentKind::Order => self.order_mapping.as_deref(),
            DocumentKind::Invoice => self.invoice_mapping.as_deref(),
        };
        CompanyMapping::parse(text, self.default_worksheet(kind).trim())
    }

    pub fn rate_table(&self) -> RateTable {
        RateTable::from_entries(&self.base_currency, &self.rates)
    }
}
