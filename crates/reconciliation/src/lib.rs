//! `finsight-reconciliation` — bank transaction ingest and invoice
//! matching.

pub mod adapter;
pub mod engine;

pub use adapter::{AdapterError, BankAdapter, FetchedTransaction};
pub use engine::{
    ReconciliationConfig, ReconciliationEngine, SyncError, SyncReport, SyncWindow,
};
