//! Derived fields computed from a source record at sync time.
//!
//! Every function here is deterministic and never fails on malformed input:
//! values that cannot be computed come back as a `NeedsVerification` variant
//! which callers carry through to the destination row.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::salesheet::tools::error::RateLookupError;
use crate::salesheet::tools::model::{DerivedValue, NEEDS_VERIFICATION, SourceRecord};

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

static CODE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[.*?\]\s*").expect("prefix pattern is valid"));

const IMMEDIATE_MARKERS: [&str; 4] = ["inmediato", "immediate", "contado", "cash"];

const CURRENCY_NAMES: [(&str, &str); 4] = [
    ("MXN", "Peso Mexicano"),
    ("USD", "Dólar Americano"),
    ("EUR", "Euro"),
    ("CAD", "Dólar Canadiense"),
];

/// Credit days granted by a payment term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditDays {
    Days(u32),
    NeedsVerification,
}

impl CreditDays {
    pub fn to_value(self) -> DerivedValue {
        match self {
            CreditDays::Days(days) => DerivedValue::fixed(Decimal::from(days), 0),
            CreditDays::NeedsVerification => DerivedValue::NeedsVerification,
        }
    }
}

/// Whether a record is paid on credit or in cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditLabel {
    Cash,
    Credit,
    NeedsVerification,
}

impl CreditLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            CreditLabel::Cash => "CASH",
            CreditLabel::Credit => "CREDIT",
            CreditLabel::NeedsVerification => NEEDS_VERIFICATION,
        }
    }
}

impl fmt::Display for CreditLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business category of a product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Manufacturing,
    Commercial,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Manufacturing => "MANUFACTURING",
            Category::Commercial => "COMMERCIAL",
        }
    }
}

/// Parses the credit days out of a payment-term descriptor.
///
/// Immediate/cash terms yield zero; otherwise the first run of digits is
/// used. Missing terms and terms without digits need verification.
pub fn credit_days(payment_term: Option<&str>) -> CreditDays {
    let Some(term) = payment_term else {
        return CreditDays::NeedsVerification;
    };
    let normalized = term.to_lowercase();
    if IMMEDIATE_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
    {
        return CreditDays::Days(0);
    }
    DIGIT_RUN
        .find(&normalized)
        .and_then(|digits| digits.as_str().parse().ok())
        .map_or(CreditDays::NeedsVerification, CreditDays::Days)
}

pub fn credit_or_cash_label(days: CreditDays) -> CreditLabel {
    match days {
        CreditDays::Days(0) => CreditLabel::Cash,
        CreditDays::Days(_) => CreditLabel::Credit,
        CreditDays::NeedsVerification => CreditLabel::NeedsVerification,
    }
}

/// Human display name for a currency code; unknown codes pass through.
pub fn currency_display_name(code: &str) -> String {
    let upper = code.trim().to_uppercase();
    CURRENCY_NAMES
        .iter()
        .find(|(known, _)| *known == upper)
        .map_or_else(|| code.to_string(), |(_, name)| (*name).to_string())
}

/// Case-insensitive substring match of the description against the
/// manufacturing keywords.
pub fn category_label(description: &str, keywords: &[String]) -> Category {
    let normalized = description.to_lowercase();
    let manufactured = keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .any(|keyword| normalized.contains(&keyword));
    if manufactured {
        Category::Manufacturing
    } else {
        Category::Commercial
    }
}

pub fn family_label(category_name: Option<&str>) -> String {
    category_name
        .map(|name| name.trim().to_uppercase())
        .unwrap_or_default()
}

/// Strips a leading `[CODE]` prefix and flattens line breaks.
pub fn clean_description(description: &str) -> String {
    let flattened = description.replace(['\r', '\n'], " ");
    CODE_PREFIX.replace(&flattened, "").trim().to_string()
}

/// Electronic-invoice UUID cell: empty when absent, canonical uppercase when
/// valid, sentinel when present but malformed.
pub fn electronic_invoice_uuid(raw: Option<&str>) -> DerivedValue {
    match raw.map(str::trim) {
        None | Some("") => DerivedValue::text(""),
        Some(text) => match Uuid::parse_str(text) {
            Ok(uuid) => DerivedValue::Text(
                uuid.hyphenated()
                    .encode_upper(&mut Uuid::encode_buffer())
                    .to_string(),
            ),
            Err(_) => DerivedValue::NeedsVerification,
        },
    }
}

/// Source of exchange rates, expressed as units of `to` per unit of `from`.
pub trait RateProvider {
    fn rate(&self, from: &str, to: &str, as_of: Option<NaiveDate>) -> Result<Decimal, RateLookupError>;
}

/// A configured exchange rate, optionally effective from a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub currency: String,
    pub rate: Decimal,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Rates against a single base currency.
///
/// Dated entries apply from their date onwards; undated entries are used
/// when no dated entry applies.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    base: String,
    undated: BTreeMap<String, Decimal>,
    dated: BTreeMap<String, BTreeMap<NaiveDate, Decimal>>,
}

impl RateTable {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            ..Self::default()
        }
    }

    pub fn from_entries<'a>(base: impl Into<String>, entries: impl IntoIterator<Item = &'a RateEntry>) -> Self {
        let mut table = Self::new(base);
        for entry in entries {
            table.insert(&entry.currency, entry.rate, entry.date);
        }
        table
    }

    pub fn insert(&mut self, currency: &str, rate: Decimal, date: Option<NaiveDate>) {
        let currency = currency.trim().to_uppercase();
        match date {
            Some(date) => {
                self.dated.entry(currency).or_default().insert(date, rate);
            }
            None => {
                self.undated.insert(currency, rate);
            }
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl RateProvider for RateTable {
    fn rate(&self, from: &str, to: &str, as_of: Option<NaiveDate>) -> Result<Decimal, RateLookupError> {
        let from_code = from.trim().to_uppercase();
        let to_code = to.trim().to_uppercase();
        if from_code == to_code {
            return Ok(Decimal::ONE);
        }
        if to_code != self.base {
            return Err(RateLookupError::UnknownPair {
                from: from_code,
                to: to_code,
            });
        }

        let dated = match (as_of, self.dated.get(&from_code)) {
            (Some(date), Some(history)) => history.range(..=date).next_back().map(|(_, rate)| *rate),
            _ => None,
        };
        let rate = match dated.or_else(|| self.undated.get(&from_code).copied()) {
            Some(rate) => rate,
            None => {
                return Err(match as_of {
                    Some(date) if self.dated.contains_key(&from_code) => RateLookupError::NoRateForDate {
                        from: from_code,
                        to: to_code,
                        date,
                    },
                    _ => RateLookupError::UnknownPair {
                        from: from_code,
                        to: to_code,
                    },
                });
            }
        };

        if rate <= Decimal::ZERO {
            return Err(RateLookupError::NonPositive { currency: from_code });
        }
        Ok(rate)
    }
}

/// Outcome of a conversion-rate lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRate {
    pub rate: Decimal,
    /// Set when the lookup failed and the fallback rate of one was used.
    pub degraded: Option<RateLookupError>,
}

/// Rate from the source currency to the base currency.
///
/// Equal currencies always convert at one. A failed lookup falls back to one
/// and is reported through [`ConversionRate::degraded`].
pub fn conversion_rate(
    provider: &dyn RateProvider,
    source_currency: &str,
    base_currency: &str,
    as_of: Option<NaiveDate>,
) -> ConversionRate {
    if source_currency.trim().eq_ignore_ascii_case(base_currency.trim()) {
        return ConversionRate {
            rate: Decimal::ONE,
            degraded: None,
        };
    }
    match provider.rate(source_currency, base_currency, as_of) {
        Ok(rate) => ConversionRate { rate, degraded: None },
        Err(error) => {
            warn!(
                currency = source_currency,
                base = base_currency,
                %error,
                "exchange rate lookup failed, falling back to 1"
            );
            ConversionRate {
                rate: Decimal::ONE,
                degraded: Some(error),
            }
        }
    }
}

/// Per-record derived fields. Recomputed on every sync.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub credit_days: CreditDays,
    pub credit_label: CreditLabel,
    pub currency_name: String,
    pub conversion: ConversionRate,
}

impl DerivedFields {
    pub fn compute(
        record: &SourceRecord,
        base_currency: &str,
        rates: &dyn RateProvider,
        as_of: Option<NaiveDate>,
    ) -> Self {
        let credit_days = credit_days(record.payment_term.as_deref());
        Self {
            credit_days,
            credit_label: credit_or_cash_label(credit_days),
            currency_name: currency_display_name(&record.currency),
            conversion: conversion_rate(rates, &record.currency, base_currency, as_of),
        }
    }
}
