use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

/// Longest worksheet name accepted by spreadsheet applications.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const INVALID_SHEET_CHARS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

/// Checks a worksheet name against the naming rules shared by Excel and
/// Google Sheets.
pub fn validate_sheet_name(name: &str) -> std::result::Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("worksheet name is empty".to_string());
    }
    if trimmed.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(format!(
            "worksheet name '{trimmed}' is longer than {MAX_SHEET_NAME_LEN} characters"
        ));
    }
    if let Some(bad) = trimmed
        .chars()
        .find(|ch| INVALID_SHEET_CHARS.contains(ch) || ch.is_control())
    {
        return Err(format!(
            "worksheet name '{trimmed}' contains invalid character {bad:?}"
        ));
    }
    Ok(())
}

/// Company name to worksheet name routing with a mandatory default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyMapping {
    entries: BTreeMap<String, String>,
    default_worksheet: String,
}

impl CompanyMapping {
    pub fn new(default_worksheet: impl Into<String>) -> Self {
        Self {
            entries: BTreeMap::new(),
            default_worksheet: default_worksheet.into(),
        }
    }

    /// Parses the serialized `{"Company": "Worksheet"}` mapping text.
    ///
    /// Malformed text yields an empty mapping and entries with a non-string or
    /// invalid worksheet name are dropped; both are logged and never fatal.
    pub fn parse(text: Option<&str>, default_worksheet: impl Into<String>) -> Self {
        let mut mapping = Self::new(default_worksheet);
        let Some(text) = text.map(str::trim).filter(|text| !text.is_empty()) else {
            return mapping;
        };

        let parsed: BTreeMap<String, Value> = match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(%error, "company mapping is not a JSON object, routing everything to the default worksheet");
                return mapping;
            }
        };

        for (company, worksheet) in parsed {
            let Value::String(worksheet) = worksheet else {
                warn!(company = %company, "dropping company mapping entry with a non-string worksheet");
                continue;
            };
            if let Err(reason) = validate_sheet_name(&worksheet) {
                warn!(company = %company, %reason, "dropping invalid company mapping entry");
                continue;
            }
            mapping.insert(company, worksheet.trim().to_string());
        }
        mapping
    }

    pub fn insert(&mut self, company: impl Into<String>, worksheet: impl Into<String>) {
        self.entries.insert(company.into(), worksheet.into());
    }

    /// Worksheet for the company, or the default when the company is unmapped.
    pub fn resolve(&self, company: &str) -> &str {
        match self.entries.get(company) {
            Some(worksheet) => {
                debug!(company, worksheet = %worksheet, "company mapped to worksheet");
                worksheet
            }
            None => {
                debug!(company, worksheet = %self.default_worksheet, "company not mapped, using default worksheet");
                &self.default_worksheet
            }
        }
    }

    pub fn default_worksheet(&self) -> &str {
        &self.default_worksheet
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every worksheet a record could be routed to, default first.
    pub fn worksheets(&self) -> Vec<&str> {
        let mut names = vec![self.default_worksheet.as_str()];
        for worksheet in self.entries.values() {
            if !names.contains(&worksheet.as_str()) {
                names.push(worksheet);
            }
        }
        names
    }
}

pub fn resolve_worksheet<'a>(company: &str, mapping: &'a CompanyMapping) -> &'a str {
    mapping.resolve(company)
}
