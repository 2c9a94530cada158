//! Ingest, auto-matching and manual corrections.
//!
//! A sync run is idempotent: rows are keyed by the bank's `external_id`
//! per account, so replaying a window never duplicates a transaction and
//! never touches a match that already exists. Auto-matching only ever
//! commits when exactly one invoice fits; anything less certain is left
//! unmatched for a human.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use finsight_core::{BankAccountId, EngineError, EngineResult, InvoiceId, TenantId, TransactionId};
use finsight_ledger::{
    BankTransaction, IngestOutcome, Invoice, LedgerReader, MatchMethod, MatchProposal, MatchState,
    ReconciliationStore,
};
use finsight_matching::CustomerMatcher;

use crate::adapter::BankAdapter;

/// Confidence multiplier when the amount fits only thanks to the
/// tolerance instead of matching the outstanding balance exactly.
const NEAR_AMOUNT_EXACTNESS: f64 = 0.9;

/// Knobs for the matching rules and the sync window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Allowed overshoot of a transaction past an invoice's outstanding
    /// balance, in minor units. Also bounds the amount gap the name rule
    /// will accept.
    pub amount_tolerance_minor: i64,
    /// Name-match confidence required before the amount rule may pair a
    /// transaction with an invoice.
    pub name_match_min_confidence: f64,
    /// When false, sync only ingests and leaves every row for manual
    /// review.
    pub auto_match_enabled: bool,
    /// Sync window length when the caller does not supply one, in days.
    pub default_window_days: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            amount_tolerance_minor: 0,
            name_match_min_confidence: 0.6,
            auto_match_enabled: true,
            default_window_days: 30,
        }
    }
}

/// Inclusive date range one sync run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Row-level failure recorded during a sync that kept going.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncError {
    /// The bank's key for the transaction the failure belongs to.
    pub external_id: String,
    pub message: String,
}

/// What one `sync_account` run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub account_id: BankAccountId,
    pub window: SyncWindow,
    /// Fresh rows stored this run.
    pub imported: usize,
    /// Rows whose `(account, external_id)` key was already known.
    pub skipped_duplicates: usize,
    pub auto_matched: usize,
    /// Incoming rows left unmatched because more than one invoice fit.
    pub ambiguous: usize,
    /// Failures that cost single rows, not the run.
    pub errors: Vec<SyncError>,
    pub completed_at: DateTime<Utc>,
}

enum AutoMatch {
    Matched,
    Ambiguous,
    NoCandidate,
}

/// Drives bank data into the ledger and keeps humans in the loop for
/// everything the rules cannot decide.
pub struct ReconciliationEngine<S> {
    store: S,
    matcher: CustomerMatcher<S>,
    config: ReconciliationConfig,
}

impl<S> ReconciliationEngine<S>
where
    S: LedgerReader + ReconciliationStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self::with_config(store, ReconciliationConfig::default())
    }

    pub fn with_config(store: S, config: ReconciliationConfig) -> Self {
        let matcher = CustomerMatcher::new(store.clone());
        Self {
            store,
            matcher,
            config,
        }
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Pulls the account's transactions from the bank and reconciles the
    /// newly seen ones. Re-running any window is safe.
    ///
    /// Row-level failures land in the report and the run keeps going; only
    /// an unknown account, an invalid window or a failed fetch abort it.
    pub fn sync_account(
        &self,
        tenant_id: TenantId,
        account_id: BankAccountId,
        adapter: &dyn BankAdapter,
        window: Option<SyncWindow>,
        today: NaiveDate,
    ) -> EngineResult<SyncReport> {
        let account = self.store.account(tenant_id, account_id)?;
        let window = match window {
            Some(window) if window.from > window.to => {
                return Err(EngineError::validation("sync window start is after its end"));
            }
            Some(window) => window,
            None => SyncWindow {
                from: today - Duration::days(self.config.default_window_days),
                to: today,
            },
        };

        tracing::info!(
            "Syncing account {} from {} to {}",
            account.name,
            window.from,
            window.to
        );
        let fetched = adapter
            .fetch_transactions(&account, window.from, window.to)
            .map_err(|err| EngineError::external_adapter(err.to_string()))?;
        tracing::debug!("Bank returned {} transactions", fetched.len());

        let mut report = SyncReport {
            account_id,
            window,
            imported: 0,
            skipped_duplicates: 0,
            auto_matched: 0,
            ambiguous: 0,
            errors: Vec::new(),
            completed_at: Utc::now(),
        };

        for row in fetched {
            if row.external_id.trim().is_empty() {
                report.errors.push(SyncError {
                    external_id: row.external_id.clone(),
                    message: "transaction is missing its external id".to_string(),
                });
                continue;
            }
            let transaction = BankTransaction {
                id: TransactionId::new(),
                account_id,
                external_id: row.external_id.clone(),
                date: row.date,
                amount: row.amount,
                currency: row.currency.clone(),
                counterparty_name: row.counterparty_name.clone(),
                counterparty_account: row.counterparty_account.clone(),
                variable_symbol: row.variable_symbol.clone(),
                matched: None,
            };
            match self
                .store
                .insert_transaction_if_absent(tenant_id, transaction.clone())
            {
                Ok(IngestOutcome::Inserted) => {
                    report.imported += 1;
                    if !self.config.auto_match_enabled {
                        continue;
                    }
                    match self.auto_match(tenant_id, &transaction) {
                        Ok(AutoMatch::Matched) => report.auto_matched += 1,
                        Ok(AutoMatch::Ambiguous) => {
                            report.ambiguous += 1;
                            tracing::debug!(
                                "Transaction {} is ambiguous, leaving unmatched",
                                row.external_id
                            );
                        }
                        Ok(AutoMatch::NoCandidate) => {}
                        Err(err) => {
                            tracing::warn!(
                                "Auto-match failed for transaction {}: {}",
                                row.external_id,
                                err
                            );
                            report.errors.push(SyncError {
                                external_id: row.external_id.clone(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
                Ok(IngestOutcome::Duplicate) => report.skipped_duplicates += 1,
                Err(err) => {
                    tracing::warn!("Failed to store transaction {}: {}", row.external_id, err);
                    report.errors.push(SyncError {
                        external_id: row.external_id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        report.completed_at = Utc::now();
        tracing::info!(
            "Sync complete for account {}: {} imported, {} duplicates, {} auto-matched, {} ambiguous, {} errors",
            account.name,
            report.imported,
            report.skipped_duplicates,
            report.auto_matched,
            report.ambiguous,
            report.errors.len()
        );
        Ok(report)
    }

    /// Ties a transaction to an invoice on a human's say-so.
    ///
    /// Validation happens here; the final unmatched-to-matched transition
    /// and the amount check run atomically in the store, so a concurrent
    /// caller loses with `Conflict` instead of double-crediting.
    pub fn match_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
        invoice_id: InvoiceId,
    ) -> EngineResult<MatchState> {
        let transaction = self.store.transaction(tenant_id, transaction_id)?;
        if transaction.is_matched() {
            return Err(EngineError::conflict("transaction is already matched"));
        }
        if !transaction.is_incoming() {
            return Err(EngineError::validation(
                "only incoming transactions can settle an invoice",
            ));
        }
        let invoice = self.store.invoice(tenant_id, invoice_id)?;
        if !invoice.is_open() {
            return Err(EngineError::conflict("invoice is not open for matching"));
        }
        if invoice.currency != transaction.currency {
            return Err(EngineError::validation(format!(
                "currency mismatch: transaction is {}, invoice is {}",
                transaction.currency, invoice.currency
            )));
        }
        let proposal = MatchProposal {
            invoice_id,
            confidence: 1.0,
            method: MatchMethod::Manual,
            amount_tolerance: self.config.amount_tolerance_minor,
        };
        let matched = self.store.apply_match(tenant_id, transaction_id, proposal)?;
        tracing::info!(
            "Manually matched transaction {} to invoice {}",
            transaction_id,
            invoice.number
        );
        Ok(matched)
    }

    /// Undoes a match: the payment row disappears, the invoice balance and
    /// status roll back, and the transaction is matchable again.
    pub fn unmatch_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> EngineResult<()> {
        self.store.revert_match(tenant_id, transaction_id)?;
        tracing::info!("Unmatched transaction {}", transaction_id);
        Ok(())
    }

    /// One shot at pairing a fresh incoming transaction with an open
    /// invoice. Exact variable-symbol hits win outright; otherwise the
    /// counterparty name plus a near-exact amount must single out one
    /// invoice.
    fn auto_match(
        &self,
        tenant_id: TenantId,
        transaction: &BankTransaction,
    ) -> EngineResult<AutoMatch> {
        if !transaction.is_incoming() {
            return Ok(AutoMatch::NoCandidate);
        }
        let open: Vec<Invoice> = self
            .store
            .open_invoices(tenant_id)
            .into_iter()
            .filter(|invoice| invoice.currency == transaction.currency)
            .collect();
        if open.is_empty() {
            return Ok(AutoMatch::NoCandidate);
        }

        if let Some(symbol) = transaction.variable_symbol.as_deref() {
            let symbol = symbol.trim();
            if !symbol.is_empty() {
                let hits: Vec<&Invoice> = open
                    .iter()
                    .filter(|invoice| symbol_matches(&invoice.number, symbol))
                    .collect();
                match hits[..] {
                    [] => {}
                    [invoice] => {
                        let proposal = MatchProposal {
                            invoice_id: invoice.id,
                            confidence: 1.0,
                            method: MatchMethod::ExactSymbol,
                            amount_tolerance: self.config.amount_tolerance_minor,
                        };
                        self.store.apply_match(tenant_id, transaction.id, proposal)?;
                        tracing::debug!(
                            "Matched transaction {} to invoice {} by variable symbol",
                            transaction.external_id,
                            invoice.number
                        );
                        return Ok(AutoMatch::Matched);
                    }
                    _ => return Ok(AutoMatch::Ambiguous),
                }
            }
        }

        let Some(name) = transaction.counterparty_name.as_deref() else {
            return Ok(AutoMatch::NoCandidate);
        };
        if name.trim().is_empty() {
            return Ok(AutoMatch::NoCandidate);
        }
        let candidates = self.matcher.match_by_name(
            tenant_id,
            name,
            Some(self.config.name_match_min_confidence),
        )?;

        let mut fits: Vec<(InvoiceId, f64)> = Vec::new();
        for candidate in &candidates {
            let invoices = open
                .iter()
                .filter(|invoice| invoice.customer_id == candidate.customer_id);
            for invoice in invoices {
                let gap = (invoice.outstanding_amount() - transaction.amount).abs();
                if gap > self.config.amount_tolerance_minor {
                    continue;
                }
                let exactness = if gap == 0 { 1.0 } else { NEAR_AMOUNT_EXACTNESS };
                fits.push((invoice.id, candidate.confidence * exactness));
            }
        }
        match fits[..] {
            [] => Ok(AutoMatch::NoCandidate),
            [(invoice_id, confidence)] => {
                let proposal = MatchProposal {
                    invoice_id,
                    confidence,
                    method: MatchMethod::AmountNameFuzzy,
                    amount_tolerance: self.config.amount_tolerance_minor,
                };
                self.store.apply_match(tenant_id, transaction.id, proposal)?;
                tracing::debug!(
                    "Matched transaction {} by counterparty name, confidence {:.2}",
                    transaction.external_id,
                    confidence
                );
                Ok(AutoMatch::Matched)
            }
            _ => Ok(AutoMatch::Ambiguous),
        }
    }
}

/// Variable symbols are digit strings; invoice numbers usually are not.
/// A symbol hits a number when it equals it outright, equals its digits
/// with separators dropped, or equals its trailing digit run.
fn symbol_matches(invoice_number: &str, symbol: &str) -> bool {
    if invoice_number == symbol {
        return true;
    }
    let digits: String = invoice_number
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if !digits.is_empty() && digits == symbol {
        return true;
    }
    let suffix_len = invoice_number
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .count();
    suffix_len > 0 && invoice_number[invoice_number.len() - suffix_len..] == *symbol
}
