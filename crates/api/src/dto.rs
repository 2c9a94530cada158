//! Request and response DTOs for the engine facade.
//!
//! Validation that only needs the request itself happens here; anything
//! that needs ledger state stays in the engines.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use finsight_core::{BankAccountId, EngineError, EngineResult, InvoiceId, TransactionId};
use finsight_forecast::{
    CashFlowForecast, GrowthMetrics, RecurringOutflow, RevenueForecast, SeasonalityMonth,
    TurnoverProjection,
};
use finsight_ledger::Customer;
use finsight_matching::{CustomerMatch, CustomerSuggestion};
use finsight_reconciliation::{SyncError, SyncReport};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastRequest {
    pub kind: String,
    /// Horizon for the revenue and cash-flow projections.
    pub months: Option<u32>,
    /// Calendar year for the turnover projection.
    pub year: Option<i32>,
    /// Opening balance for the cash-flow projection, minor units.
    /// Required whenever the request computes a cash-flow section.
    pub current_balance: Option<i64>,
    /// Known recurring outflows fed into the cash-flow projection.
    #[serde(default)]
    pub outflows: Vec<RecurringOutflow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchCustomerRequest {
    pub text: String,
    /// One of `generic`, `email`, `document`. Defaults to `generic`.
    pub kind: Option<String>,
    /// Only read when `kind` is `email`.
    pub sender_email: Option<String>,
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerLookupRequest {
    /// Tax id; matched exactly after normalization.
    pub identifier: Option<String>,
    /// Free-text name fragment for fuzzy suggestions.
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncAccountRequest {
    pub account_id: BankAccountId,
    /// Both bounds or neither; with neither the engine uses its default
    /// trailing window.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchTransactionRequest {
    pub transaction_id: TransactionId,
    pub invoice_id: InvoiceId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnmatchTransactionRequest {
    pub transaction_id: TransactionId,
}

// -------------------------
// Kind parsing
// -------------------------

/// What a forecast request asks for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ForecastKind {
    Revenue,
    CashFlow,
    Seasonality,
    Growth,
    Turnover,
    All,
}

impl ForecastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastKind::Revenue => "revenue",
            ForecastKind::CashFlow => "cashflow",
            ForecastKind::Seasonality => "seasonality",
            ForecastKind::Growth => "growth",
            ForecastKind::Turnover => "turnover",
            ForecastKind::All => "all",
        }
    }
}

pub fn parse_forecast_kind(s: &str) -> EngineResult<ForecastKind> {
    match s.to_lowercase().as_str() {
        "revenue" => Ok(ForecastKind::Revenue),
        "cashflow" | "cash_flow" => Ok(ForecastKind::CashFlow),
        "seasonality" => Ok(ForecastKind::Seasonality),
        "growth" => Ok(ForecastKind::Growth),
        "turnover" => Ok(ForecastKind::Turnover),
        "all" => Ok(ForecastKind::All),
        _ => Err(EngineError::validation(
            "kind must be one of: revenue, cashflow, seasonality, growth, turnover, all",
        )),
    }
}

/// How the matcher should read the text it is given.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MatchKind {
    Generic,
    Email,
    Document,
}

pub fn parse_match_kind(s: &str) -> EngineResult<MatchKind> {
    match s.to_lowercase().as_str() {
        "generic" => Ok(MatchKind::Generic),
        "email" => Ok(MatchKind::Email),
        "document" => Ok(MatchKind::Document),
        _ => Err(EngineError::validation(
            "kind must be one of: generic, email, document",
        )),
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// Sections are filled per requested kind; `all` fills every one.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<RevenueForecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_flow: Option<CashFlowForecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasonality: Option<Vec<SeasonalityMonth>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth: Option<GrowthMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover: Option<TurnoverProjection>,
}

impl ForecastResponse {
    pub(crate) fn empty(kind: ForecastKind) -> Self {
        Self {
            kind: kind.as_str(),
            revenue: None,
            cash_flow: None,
            seasonality: None,
            growth: None,
            turnover: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchCustomerResponse {
    /// Candidates above the confidence floor, best first.
    pub matches: Vec<CustomerMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match: Option<CustomerMatch>,
}

impl From<Vec<CustomerMatch>> for MatchCustomerResponse {
    fn from(matches: Vec<CustomerMatch>) -> Self {
        let best_match = matches.first().cloned();
        Self {
            matches,
            best_match,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerLookupResponse {
    /// Exact hit for an `identifier` lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    /// Fuzzy hits for a `query` lookup, best first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<CustomerSuggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncAccountResponse {
    pub account_id: BankAccountId,
    pub imported: usize,
    pub auto_matched: usize,
    pub skipped_duplicates: usize,
    pub ambiguous: usize,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<SyncError>,
}

impl From<SyncReport> for SyncAccountResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            account_id: report.account_id,
            imported: report.imported,
            auto_matched: report.auto_matched,
            skipped_duplicates: report.skipped_duplicates,
            ambiguous: report.ambiguous,
            date_from: report.window.from,
            date_to: report.window.to,
            timestamp: report.completed_at,
            errors: report.errors,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
