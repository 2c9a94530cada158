//! `finsight-ledger` — financial ledger rows and the access traits the
//! engines run against.
//!
//! The ledger itself is owned by a surrounding CRUD layer; this crate
//! defines the read surface ([`LedgerReader`]), the one write path
//! ([`ReconciliationStore`]), and an in-memory implementation of both for
//! tests and single-process deployments.

pub mod customer;
pub mod invoice;
pub mod revenue;
pub mod store;
pub mod transaction;

pub use customer::Customer;
pub use invoice::{Invoice, InvoiceStatus, Payment};
pub use revenue::{RevenuePoint, monthly_revenue};
pub use store::{IngestOutcome, InMemoryLedger, LedgerReader, MatchProposal, ReconciliationStore};
pub use transaction::{BankAccount, BankTransaction, MatchMethod, MatchState};
