//! Boundary to external bank interfaces.
//!
//! An adapter only fetches; it never writes to the ledger and never sees
//! tenant state. Whatever protocol sits behind it (PSD2 APIs, statement
//! files, test fixtures), the engine consumes one neutral row shape.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use finsight_ledger::BankAccount;

/// Failure inside a bank interface, before any row reached the ledger.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The interface could not be reached or refused the request.
    #[error("bank interface unavailable: {0}")]
    Unavailable(String),
    /// The interface answered, but the payload could not be understood.
    #[error("malformed bank response: {0}")]
    Protocol(String),
}

/// One transaction as reported by the bank, not yet a ledger row.
///
/// `external_id` is the bank's own unique key for the transaction; the
/// engine relies on it for idempotent re-syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedTransaction {
    pub external_id: String,
    pub date: NaiveDate,
    /// Minor units; positive = incoming, negative = outgoing.
    pub amount: i64,
    pub currency: String,
    pub counterparty_name: Option<String>,
    pub counterparty_account: Option<String>,
    pub variable_symbol: Option<String>,
}

/// Read-only window into one bank account's transaction history.
pub trait BankAdapter: Send + Sync {
    /// Transactions booked on the account within `from..=to`, any order.
    fn fetch_transactions(
        &self,
        account: &BankAccount,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FetchedTransaction>, AdapterError>;
}
