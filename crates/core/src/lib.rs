//! `finsight-core` — engine foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure
//! concerns): strongly-typed identifiers, the engine error taxonomy,
//! calendar-month bucketing, and confidence grading.

pub mod confidence;
pub mod error;
pub mod id;
pub mod month;

pub use confidence::Confidence;
pub use error::{EngineError, EngineResult};
pub use id::{BankAccountId, CustomerId, InvoiceId, PaymentId, TenantId, TransactionId};
pub use month::MonthKey;
