use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use finsight_core::{BankAccountId, InvoiceId, PaymentId, TransactionId};

/// How a transaction was tied to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Variable symbol equals an open invoice number (or its numeric suffix).
    ExactSymbol,
    /// Counterparty name resolved to a customer + amount within tolerance.
    AmountNameFuzzy,
    /// Confirmed by a human.
    Manual,
}

/// The matched half of a transaction's state machine.
///
/// Bundling invoice id, confidence, and method into one value keeps the
/// `is_matched == matched_invoice_id.is_some()` invariant true by
/// construction: a transaction is matched iff `matched` is `Some`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub invoice_id: InvoiceId,
    /// Confidence in \[0, 1\]; 1.0 for exact-symbol and manual matches.
    pub confidence: f64,
    pub method: MatchMethod,
    /// The payment row created when the match was applied. Unmatch removes
    /// this row again, so the payments-sum-equals-paid-amount invariant
    /// survives both directions.
    pub payment_id: PaymentId,
}

/// Ledger row: bank transaction ingested from the external source system.
///
/// `external_id` is the source system's unique key and the dedupe key per
/// `(tenant, account)`. State machine: `unmatched → matched → unmatched`
/// (explicit unmatch only); the engine never edits any other field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: TransactionId,
    pub account_id: BankAccountId,
    pub external_id: String,
    pub date: NaiveDate,
    /// Minor units; positive = incoming, negative = outgoing.
    pub amount: i64,
    pub currency: String,
    pub counterparty_name: Option<String>,
    pub counterparty_account: Option<String>,
    /// Free-form payment reference, often an invoice number fragment.
    pub variable_symbol: Option<String>,
    pub matched: Option<MatchState>,
}

impl BankTransaction {
    pub fn is_matched(&self) -> bool {
        self.matched.is_some()
    }

    pub fn matched_invoice_id(&self) -> Option<InvoiceId> {
        self.matched.as_ref().map(|m| m.invoice_id)
    }

    /// Only incoming money can settle invoices.
    pub fn is_incoming(&self) -> bool {
        self.amount > 0
    }
}

/// Ledger row: a bank account the tenant syncs transactions from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub name: String,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(matched: Option<MatchState>) -> BankTransaction {
        BankTransaction {
            id: TransactionId::new(),
            account_id: BankAccountId::new(),
            external_id: "ext-1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
            amount: 1500,
            currency: "CZK".to_string(),
            counterparty_name: Some("Novák Consulting".to_string()),
            counterparty_account: Some("123456789/0100".to_string()),
            variable_symbol: Some("20260001".to_string()),
            matched,
        }
    }

    #[test]
    fn matched_state_is_one_value() {
        let unmatched = transaction(None);
        assert!(!unmatched.is_matched());
        assert_eq!(unmatched.matched_invoice_id(), None);

        let invoice_id = InvoiceId::new();
        let matched = transaction(Some(MatchState {
            invoice_id,
            confidence: 1.0,
            method: MatchMethod::Manual,
            payment_id: PaymentId::new(),
        }));
        assert!(matched.is_matched());
        assert_eq!(matched.matched_invoice_id(), Some(invoice_id));
    }

    #[test]
    fn outgoing_amounts_are_not_incoming() {
        let mut tx = transaction(None);
        tx.amount = -500;
        assert!(!tx.is_incoming());
    }
}
