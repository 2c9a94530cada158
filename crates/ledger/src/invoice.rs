use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use finsight_core::{CustomerId, InvoiceId, PaymentId};

/// Invoice status lifecycle.
///
/// `Paid` holds iff `paid_amount == total_amount`; `Overdue` is `Sent` past
/// its due date with an outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

/// Ledger snapshot row: invoice.
///
/// Owned and mutated by the CRUD layer; this engine only touches
/// `paid_amount`/`status` during reconciliation. Amounts are in currency
/// minor units (cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    /// Human-visible invoice number, the exact-symbol reconciliation target.
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: i64,
    pub paid_amount: i64,
    /// ISO currency code, e.g. "CZK".
    pub currency: String,
    pub status: InvoiceStatus,
}

impl Invoice {
    pub fn outstanding_amount(&self) -> i64 {
        (self.total_amount - self.paid_amount).max(0)
    }

    /// An invoice that can still receive money.
    pub fn is_open(&self) -> bool {
        matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Overdue)
            && self.outstanding_amount() > 0
    }

    /// Fully settled; the basis of payment-behavior statistics.
    pub fn is_resolved(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.is_open() && self.due_date < today
    }

    /// Recompute `status` after a `paid_amount` change.
    ///
    /// Draft and cancelled invoices never change state here; they are not
    /// part of the reconciliation lifecycle.
    pub fn recompute_status(&mut self, today: NaiveDate) {
        if matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
            return;
        }
        self.status = if self.paid_amount >= self.total_amount {
            InvoiceStatus::Paid
        } else if self.due_date < today {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Sent
        };
    }

    /// Invariant check for rows entering the engine.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.total_amount < 0 {
            return Err(format!("invoice {}: negative total_amount", self.number));
        }
        if self.paid_amount < 0 || self.paid_amount > self.total_amount {
            return Err(format!(
                "invoice {}: paid_amount {} outside 0..={}",
                self.number, self.paid_amount, self.total_amount
            ));
        }
        let fully_paid = self.paid_amount == self.total_amount && self.total_amount > 0;
        if (self.status == InvoiceStatus::Paid) != fully_paid
            && !matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled)
        {
            return Err(format!(
                "invoice {}: status {:?} inconsistent with paid {}/{}",
                self.number, self.status, self.paid_amount, self.total_amount
            ));
        }
        Ok(())
    }
}

/// Ledger snapshot row: a recorded payment against an invoice.
///
/// Immutable once created; the sum of a sent invoice's payments defines its
/// `paid_amount` in the owning CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: i64,
    pub paid_at: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(total: i64, paid: i64, status: InvoiceStatus) -> Invoice {
        Invoice {
            id: InvoiceId::new(),
            customer_id: CustomerId::new(),
            number: "2026-0001".to_string(),
            issue_date: date(2026, 1, 10),
            due_date: date(2026, 1, 24),
            total_amount: total,
            paid_amount: paid,
            currency: "CZK".to_string(),
            status,
        }
    }

    #[test]
    fn outstanding_never_negative() {
        let inv = invoice(1000, 1000, InvoiceStatus::Paid);
        assert_eq!(inv.outstanding_amount(), 0);
    }

    #[test]
    fn recompute_flips_to_paid_only_at_full_amount() {
        let mut inv = invoice(1000, 400, InvoiceStatus::Sent);
        inv.recompute_status(date(2026, 1, 20));
        assert_eq!(inv.status, InvoiceStatus::Sent);

        inv.paid_amount = 1000;
        inv.recompute_status(date(2026, 1, 20));
        assert_eq!(inv.status, InvoiceStatus::Paid);
    }

    #[test]
    fn recompute_marks_overdue_past_due_date() {
        let mut inv = invoice(1000, 0, InvoiceStatus::Sent);
        inv.recompute_status(date(2026, 2, 1));
        assert_eq!(inv.status, InvoiceStatus::Overdue);
    }

    #[test]
    fn cancelled_invoices_are_outside_the_lifecycle() {
        let mut inv = invoice(1000, 0, InvoiceStatus::Cancelled);
        inv.recompute_status(date(2026, 2, 1));
        assert_eq!(inv.status, InvoiceStatus::Cancelled);
        assert!(!inv.is_open());
    }

    #[test]
    fn invariant_check_rejects_overpaid_rows() {
        let inv = invoice(1000, 1200, InvoiceStatus::Sent);
        let err = inv.check_invariants().unwrap_err();
        assert!(err.contains("outside"));
    }
}
