//! Ledger access traits and the in-memory reference implementation.
//!
//! Engines read through [`LedgerReader`] and write through
//! [`ReconciliationStore`], so they stay storage-agnostic. Rows are keyed
//! by `(TenantId, id)` pairs; a lookup under the wrong tenant is
//! indistinguishable from a missing row and reports `NotFound`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;

use finsight_core::{
    BankAccountId, CustomerId, EngineError, EngineResult, InvoiceId, PaymentId, TenantId,
    TransactionId,
};

use crate::customer::Customer;
use crate::invoice::{Invoice, InvoiceStatus, Payment};
use crate::transaction::{BankAccount, BankTransaction, MatchMethod, MatchState};

/// Read access to the tenant-scoped ledger.
///
/// Getters report `NotFound` for rows that are absent or belong to another
/// tenant; list methods return whatever exists, which may be empty.
pub trait LedgerReader: Send + Sync {
    fn customer(&self, tenant_id: TenantId, customer_id: CustomerId) -> EngineResult<Customer>;
    fn customers(&self, tenant_id: TenantId) -> Vec<Customer>;

    fn invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> EngineResult<Invoice>;
    fn invoices(&self, tenant_id: TenantId) -> Vec<Invoice>;
    fn invoices_for_customer(&self, tenant_id: TenantId, customer_id: CustomerId) -> Vec<Invoice>;

    fn payments(&self, tenant_id: TenantId) -> Vec<Payment>;
    fn payments_for_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Vec<Payment>;

    fn account(&self, tenant_id: TenantId, account_id: BankAccountId)
    -> EngineResult<BankAccount>;
    fn transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> EngineResult<BankTransaction>;
    fn transactions_for_account(
        &self,
        tenant_id: TenantId,
        account_id: BankAccountId,
    ) -> Vec<BankTransaction>;

    /// Invoices that still expect money: sent or overdue with a positive
    /// outstanding balance.
    fn open_invoices(&self, tenant_id: TenantId) -> Vec<Invoice> {
        self.invoices(tenant_id)
            .into_iter()
            .filter(|invoice| invoice.is_open())
            .collect()
    }
}

/// Outcome of an idempotent transaction insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    /// The `(account, external_id)` key was already present; the stored row
    /// is untouched.
    Duplicate,
}

/// A proposed `unmatched → matched` transition, applied atomically.
#[derive(Debug, Clone)]
pub struct MatchProposal {
    pub invoice_id: InvoiceId,
    /// Confidence in \[0, 1\] recorded on the transaction.
    pub confidence: f64,
    pub method: MatchMethod,
    /// Allowed overshoot of the transaction amount past the outstanding
    /// balance, in minor units.
    pub amount_tolerance: i64,
}

/// The reconciliation write path.
///
/// Each method is one atomic step: concurrent calls over the same
/// transaction resolve to exactly one winner and the rest see `Conflict`.
pub trait ReconciliationStore: Send + Sync {
    /// Store a fetched transaction unless its `(account, external_id)` key
    /// is already known. Fresh rows always start unmatched.
    fn insert_transaction_if_absent(
        &self,
        tenant_id: TenantId,
        transaction: BankTransaction,
    ) -> EngineResult<IngestOutcome>;

    /// Compare-and-set the transaction to matched, credit the invoice, and
    /// record the credit as a payment row.
    ///
    /// The amount check runs inside the critical section: the transaction
    /// must not exceed the invoice's current outstanding balance by more
    /// than the tolerance, and the credit is capped at the outstanding
    /// balance so `paid_amount` never exceeds `total_amount`.
    fn apply_match(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
        proposal: MatchProposal,
    ) -> EngineResult<MatchState>;

    /// Reverse a match: remove the payment row it created, subtract its
    /// amount from the invoice, and return the transaction to unmatched.
    fn revert_match(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> EngineResult<()>;
}

impl<S: LedgerReader + ?Sized> LedgerReader for &S {
    fn customer(&self, tenant_id: TenantId, customer_id: CustomerId) -> EngineResult<Customer> {
        (**self).customer(tenant_id, customer_id)
    }

    fn customers(&self, tenant_id: TenantId) -> Vec<Customer> {
        (**self).customers(tenant_id)
    }

    fn invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> EngineResult<Invoice> {
        (**self).invoice(tenant_id, invoice_id)
    }

    fn invoices(&self, tenant_id: TenantId) -> Vec<Invoice> {
        (**self).invoices(tenant_id)
    }

    fn invoices_for_customer(&self, tenant_id: TenantId, customer_id: CustomerId) -> Vec<Invoice> {
        (**self).invoices_for_customer(tenant_id, customer_id)
    }

    fn payments(&self, tenant_id: TenantId) -> Vec<Payment> {
        (**self).payments(tenant_id)
    }

    fn payments_for_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Vec<Payment> {
        (**self).payments_for_invoice(tenant_id, invoice_id)
    }

    fn account(
        &self,
        tenant_id: TenantId,
        account_id: BankAccountId,
    ) -> EngineResult<BankAccount> {
        (**self).account(tenant_id, account_id)
    }

    fn transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> EngineResult<BankTransaction> {
        (**self).transaction(tenant_id, transaction_id)
    }

    fn transactions_for_account(
        &self,
        tenant_id: TenantId,
        account_id: BankAccountId,
    ) -> Vec<BankTransaction> {
        (**self).transactions_for_account(tenant_id, account_id)
    }
}

impl<S: ReconciliationStore + ?Sized> ReconciliationStore for &S {
    fn insert_transaction_if_absent(
        &self,
        tenant_id: TenantId,
        transaction: BankTransaction,
    ) -> EngineResult<IngestOutcome> {
        (**self).insert_transaction_if_absent(tenant_id, transaction)
    }

    fn apply_match(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
        proposal: MatchProposal,
    ) -> EngineResult<MatchState> {
        (**self).apply_match(tenant_id, transaction_id, proposal)
    }

    fn revert_match(&self, tenant_id: TenantId, transaction_id: TransactionId) -> EngineResult<()> {
        (**self).revert_match(tenant_id, transaction_id)
    }
}

impl<S: LedgerReader + ?Sized> LedgerReader for Arc<S> {
    fn customer(&self, tenant_id: TenantId, customer_id: CustomerId) -> EngineResult<Customer> {
        (**self).customer(tenant_id, customer_id)
    }

    fn customers(&self, tenant_id: TenantId) -> Vec<Customer> {
        (**self).customers(tenant_id)
    }

    fn invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> EngineResult<Invoice> {
        (**self).invoice(tenant_id, invoice_id)
    }

    fn invoices(&self, tenant_id: TenantId) -> Vec<Invoice> {
        (**self).invoices(tenant_id)
    }

    fn invoices_for_customer(&self, tenant_id: TenantId, customer_id: CustomerId) -> Vec<Invoice> {
        (**self).invoices_for_customer(tenant_id, customer_id)
    }

    fn payments(&self, tenant_id: TenantId) -> Vec<Payment> {
        (**self).payments(tenant_id)
    }

    fn payments_for_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Vec<Payment> {
        (**self).payments_for_invoice(tenant_id, invoice_id)
    }

    fn account(
        &self,
        tenant_id: TenantId,
        account_id: BankAccountId,
    ) -> EngineResult<BankAccount> {
        (**self).account(tenant_id, account_id)
    }

    fn transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> EngineResult<BankTransaction> {
        (**self).transaction(tenant_id, transaction_id)
    }

    fn transactions_for_account(
        &self,
        tenant_id: TenantId,
        account_id: BankAccountId,
    ) -> Vec<BankTransaction> {
        (**self).transactions_for_account(tenant_id, account_id)
    }
}

impl<S: ReconciliationStore + ?Sized> ReconciliationStore for Arc<S> {
    fn insert_transaction_if_absent(
        &self,
        tenant_id: TenantId,
        transaction: BankTransaction,
    ) -> EngineResult<IngestOutcome> {
        (**self).insert_transaction_if_absent(tenant_id, transaction)
    }

    fn apply_match(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
        proposal: MatchProposal,
    ) -> EngineResult<MatchState> {
        (**self).apply_match(tenant_id, transaction_id, proposal)
    }

    fn revert_match(&self, tenant_id: TenantId, transaction_id: TransactionId) -> EngineResult<()> {
        (**self).revert_match(tenant_id, transaction_id)
    }
}

#[derive(Default)]
struct LedgerState {
    customers: HashMap<(TenantId, CustomerId), Customer>,
    invoices: HashMap<(TenantId, InvoiceId), Invoice>,
    payments: HashMap<(TenantId, PaymentId), Payment>,
    accounts: HashMap<(TenantId, BankAccountId), BankAccount>,
    transactions: HashMap<(TenantId, TransactionId), BankTransaction>,
    /// Dedupe index for ingest, keyed `(tenant, account, external_id)`.
    ingest_keys: HashSet<(TenantId, BankAccountId, String)>,
}

/// Single-process ledger used by the engines in tests and demos.
///
/// One `RwLock` over the whole state is the atomicity contract: every
/// reconciliation write runs under the write guard, so readers never
/// observe a half-applied match.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> EngineResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| EngineError::conflict("ledger state lock poisoned"))
    }

    fn write_state(&self) -> EngineResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| EngineError::conflict("ledger state lock poisoned"))
    }

    pub fn upsert_customer(&self, tenant_id: TenantId, customer: Customer) -> EngineResult<()> {
        let mut state = self.write_state()?;
        state.customers.insert((tenant_id, customer.id), customer);
        Ok(())
    }

    pub fn upsert_account(&self, tenant_id: TenantId, account: BankAccount) -> EngineResult<()> {
        let mut state = self.write_state()?;
        state.accounts.insert((tenant_id, account.id), account);
        Ok(())
    }

    /// Insert an invoice after checking its row invariants.
    pub fn insert_invoice(&self, tenant_id: TenantId, invoice: Invoice) -> EngineResult<()> {
        invoice.check_invariants().map_err(EngineError::validation)?;
        let mut state = self.write_state()?;
        state.invoices.insert((tenant_id, invoice.id), invoice);
        Ok(())
    }

    /// Record a payment against an invoice and bring `paid_amount` and
    /// `status` along, so the payments-sum invariant holds by construction.
    pub fn record_payment(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        amount: i64,
        paid_at: NaiveDate,
    ) -> EngineResult<PaymentId> {
        if amount <= 0 {
            return Err(EngineError::validation("payment amount must be positive"));
        }
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let invoice = state
            .invoices
            .get_mut(&(tenant_id, invoice_id))
            .ok_or_else(|| EngineError::not_found("invoice"))?;
        if matches!(
            invoice.status,
            InvoiceStatus::Draft | InvoiceStatus::Cancelled
        ) {
            return Err(EngineError::validation(
                "cannot record a payment on a draft or cancelled invoice",
            ));
        }
        if invoice.paid_amount + amount > invoice.total_amount {
            return Err(EngineError::validation("payment would overpay the invoice"));
        }
        invoice.paid_amount += amount;
        invoice.recompute_status(paid_at);
        let payment = Payment {
            id: PaymentId::new(),
            invoice_id,
            amount,
            paid_at,
        };
        let payment_id = payment.id;
        state.payments.insert((tenant_id, payment_id), payment);
        Ok(payment_id)
    }
}

impl LedgerReader for InMemoryLedger {
    fn customer(&self, tenant_id: TenantId, customer_id: CustomerId) -> EngineResult<Customer> {
        let state = self.read_state()?;
        state
            .customers
            .get(&(tenant_id, customer_id))
            .cloned()
            .ok_or_else(|| EngineError::not_found("customer"))
    }

    fn customers(&self, tenant_id: TenantId) -> Vec<Customer> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        state
            .customers
            .iter()
            .filter(|((tenant, _), _)| *tenant == tenant_id)
            .map(|(_, customer)| customer.clone())
            .collect()
    }

    fn invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> EngineResult<Invoice> {
        let state = self.read_state()?;
        state
            .invoices
            .get(&(tenant_id, invoice_id))
            .cloned()
            .ok_or_else(|| EngineError::not_found("invoice"))
    }

    fn invoices(&self, tenant_id: TenantId) -> Vec<Invoice> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        state
            .invoices
            .iter()
            .filter(|((tenant, _), _)| *tenant == tenant_id)
            .map(|(_, invoice)| invoice.clone())
            .collect()
    }

    fn invoices_for_customer(&self, tenant_id: TenantId, customer_id: CustomerId) -> Vec<Invoice> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        state
            .invoices
            .iter()
            .filter(|((tenant, _), invoice)| {
                *tenant == tenant_id && invoice.customer_id == customer_id
            })
            .map(|(_, invoice)| invoice.clone())
            .collect()
    }

    fn payments(&self, tenant_id: TenantId) -> Vec<Payment> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        state
            .payments
            .iter()
            .filter(|((tenant, _), _)| *tenant == tenant_id)
            .map(|(_, payment)| payment.clone())
            .collect()
    }

    fn payments_for_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Vec<Payment> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        state
            .payments
            .iter()
            .filter(|((tenant, _), payment)| {
                *tenant == tenant_id && payment.invoice_id == invoice_id
            })
            .map(|(_, payment)| payment.clone())
            .collect()
    }

    fn account(
        &self,
        tenant_id: TenantId,
        account_id: BankAccountId,
    ) -> EngineResult<BankAccount> {
        let state = self.read_state()?;
        state
            .accounts
            .get(&(tenant_id, account_id))
            .cloned()
            .ok_or_else(|| EngineError::not_found("bank account"))
    }

    fn transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> EngineResult<BankTransaction> {
        let state = self.read_state()?;
        state
            .transactions
            .get(&(tenant_id, transaction_id))
            .cloned()
            .ok_or_else(|| EngineError::not_found("bank transaction"))
    }

    fn transactions_for_account(
        &self,
        tenant_id: TenantId,
        account_id: BankAccountId,
    ) -> Vec<BankTransaction> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        state
            .transactions
            .iter()
            .filter(|((tenant, _), transaction)| {
                *tenant == tenant_id && transaction.account_id == account_id
            })
            .map(|(_, transaction)| transaction.clone())
            .collect()
    }
}

impl ReconciliationStore for InMemoryLedger {
    fn insert_transaction_if_absent(
        &self,
        tenant_id: TenantId,
        mut transaction: BankTransaction,
    ) -> EngineResult<IngestOutcome> {
        let mut state = self.write_state()?;
        if !state
            .accounts
            .contains_key(&(tenant_id, transaction.account_id))
        {
            return Err(EngineError::not_found("bank account"));
        }
        let key = (
            tenant_id,
            transaction.account_id,
            transaction.external_id.clone(),
        );
        if state.ingest_keys.contains(&key) {
            return Ok(IngestOutcome::Duplicate);
        }
        transaction.matched = None;
        state.ingest_keys.insert(key);
        state
            .transactions
            .insert((tenant_id, transaction.id), transaction);
        Ok(IngestOutcome::Inserted)
    }

    fn apply_match(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
        proposal: MatchProposal,
    ) -> EngineResult<MatchState> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let transaction = state
            .transactions
            .get_mut(&(tenant_id, transaction_id))
            .ok_or_else(|| EngineError::not_found("bank transaction"))?;
        if transaction.is_matched() {
            return Err(EngineError::conflict("transaction is already matched"));
        }
        let invoice = state
            .invoices
            .get_mut(&(tenant_id, proposal.invoice_id))
            .ok_or_else(|| EngineError::not_found("invoice"))?;
        let outstanding = invoice.outstanding_amount();
        if outstanding == 0 {
            return Err(EngineError::conflict("invoice is already settled"));
        }
        if transaction.amount <= 0
            || transaction.amount > outstanding + proposal.amount_tolerance
        {
            return Err(EngineError::AmountMismatch {
                transaction_amount: transaction.amount,
                outstanding,
                tolerance: proposal.amount_tolerance,
            });
        }
        let credit = transaction.amount.min(outstanding);
        invoice.paid_amount += credit;
        invoice.recompute_status(transaction.date);
        let payment = Payment {
            id: PaymentId::new(),
            invoice_id: proposal.invoice_id,
            amount: credit,
            paid_at: transaction.date,
        };
        let matched = MatchState {
            invoice_id: proposal.invoice_id,
            confidence: proposal.confidence,
            method: proposal.method,
            payment_id: payment.id,
        };
        state.payments.insert((tenant_id, payment.id), payment);
        transaction.matched = Some(matched.clone());
        Ok(matched)
    }

    fn revert_match(&self, tenant_id: TenantId, transaction_id: TransactionId) -> EngineResult<()> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let transaction = state
            .transactions
            .get_mut(&(tenant_id, transaction_id))
            .ok_or_else(|| EngineError::not_found("bank transaction"))?;
        let Some(matched) = transaction.matched.clone() else {
            return Err(EngineError::conflict("transaction is not matched"));
        };
        let invoice = state
            .invoices
            .get_mut(&(tenant_id, matched.invoice_id))
            .ok_or_else(|| EngineError::not_found("invoice"))?;
        let payment = state
            .payments
            .remove(&(tenant_id, matched.payment_id))
            .ok_or_else(|| EngineError::conflict("matched payment row is missing"))?;
        invoice.paid_amount -= payment.amount;
        invoice.recompute_status(transaction.date);
        transaction.matched = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_invoice(customer_id: CustomerId, total: i64, paid: i64) -> Invoice {
        Invoice {
            id: InvoiceId::new(),
            customer_id,
            number: "2026-0001".to_string(),
            issue_date: date(2026, 1, 10),
            due_date: date(2026, 2, 9),
            total_amount: total,
            paid_amount: paid,
            currency: "CZK".to_string(),
            status: InvoiceStatus::Sent,
        }
    }

    fn incoming(account_id: BankAccountId, amount: i64, external_id: &str) -> BankTransaction {
        BankTransaction {
            id: TransactionId::new(),
            account_id,
            external_id: external_id.to_string(),
            date: date(2026, 2, 1),
            amount,
            currency: "CZK".to_string(),
            counterparty_name: Some("Alfa Trade s.r.o.".to_string()),
            counterparty_account: Some("123456789/0800".to_string()),
            variable_symbol: Some("20260001".to_string()),
            matched: None,
        }
    }

    fn seeded_ledger() -> (InMemoryLedger, TenantId, BankAccountId) {
        let ledger = InMemoryLedger::new();
        let tenant_id = TenantId::new();
        let account = BankAccount {
            id: BankAccountId::new(),
            name: "Operating".to_string(),
            currency: "CZK".to_string(),
        };
        let account_id = account.id;
        ledger.upsert_account(tenant_id, account).unwrap();
        (ledger, tenant_id, account_id)
    }

    #[test]
    fn ingest_is_idempotent_per_external_id() {
        let (ledger, tenant_id, account_id) = seeded_ledger();

        let first = incoming(account_id, 1_000, "ext-42");
        assert_eq!(
            ledger
                .insert_transaction_if_absent(tenant_id, first)
                .unwrap(),
            IngestOutcome::Inserted
        );

        let replay = incoming(account_id, 1_000, "ext-42");
        assert_eq!(
            ledger
                .insert_transaction_if_absent(tenant_id, replay)
                .unwrap(),
            IngestOutcome::Duplicate
        );
        assert_eq!(
            ledger.transactions_for_account(tenant_id, account_id).len(),
            1
        );
    }

    #[test]
    fn lookups_do_not_cross_tenants() {
        let (ledger, tenant_id, _) = seeded_ledger();
        let invoice = open_invoice(CustomerId::new(), 5_000, 0);
        let invoice_id = invoice.id;
        ledger.insert_invoice(tenant_id, invoice).unwrap();

        let stranger = TenantId::new();
        let err = ledger.invoice(stranger, invoice_id).unwrap_err();
        assert!(matches!(err, EngineError::NotFound("invoice")));
        assert!(ledger.invoices(stranger).is_empty());
    }

    #[test]
    fn apply_match_rejects_a_second_match() {
        let (ledger, tenant_id, account_id) = seeded_ledger();
        let invoice = open_invoice(CustomerId::new(), 5_000, 0);
        let invoice_id = invoice.id;
        ledger.insert_invoice(tenant_id, invoice).unwrap();

        let transaction = incoming(account_id, 2_000, "ext-1");
        let transaction_id = transaction.id;
        ledger
            .insert_transaction_if_absent(tenant_id, transaction)
            .unwrap();

        let proposal = MatchProposal {
            invoice_id,
            confidence: 1.0,
            method: MatchMethod::Manual,
            amount_tolerance: 0,
        };
        ledger
            .apply_match(tenant_id, transaction_id, proposal.clone())
            .unwrap();
        let err = ledger
            .apply_match(tenant_id, transaction_id, proposal)
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn apply_match_rejects_overshoot_beyond_tolerance() {
        let (ledger, tenant_id, account_id) = seeded_ledger();
        let invoice = open_invoice(CustomerId::new(), 1_000, 0);
        let invoice_id = invoice.id;
        ledger.insert_invoice(tenant_id, invoice).unwrap();

        let transaction = incoming(account_id, 1_500, "ext-1");
        let transaction_id = transaction.id;
        ledger
            .insert_transaction_if_absent(tenant_id, transaction)
            .unwrap();

        let err = ledger
            .apply_match(
                tenant_id,
                transaction_id,
                MatchProposal {
                    invoice_id,
                    confidence: 1.0,
                    method: MatchMethod::Manual,
                    amount_tolerance: 0,
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::AmountMismatch {
                transaction_amount: 1_500,
                outstanding: 1_000,
                tolerance: 0,
            }
        ));
        // The losing call leaves both rows untouched.
        assert!(!ledger
            .transaction(tenant_id, transaction_id)
            .unwrap()
            .is_matched());
        assert_eq!(ledger.invoice(tenant_id, invoice_id).unwrap().paid_amount, 0);
    }

    #[test]
    fn within_tolerance_overshoot_caps_credit_at_outstanding() {
        let (ledger, tenant_id, account_id) = seeded_ledger();
        let invoice = open_invoice(CustomerId::new(), 1_000, 0);
        let invoice_id = invoice.id;
        ledger.insert_invoice(tenant_id, invoice).unwrap();

        let transaction = incoming(account_id, 1_030, "ext-1");
        let transaction_id = transaction.id;
        ledger
            .insert_transaction_if_absent(tenant_id, transaction)
            .unwrap();

        let matched = ledger
            .apply_match(
                tenant_id,
                transaction_id,
                MatchProposal {
                    invoice_id,
                    confidence: 1.0,
                    method: MatchMethod::Manual,
                    amount_tolerance: 50,
                },
            )
            .unwrap();

        let invoice = ledger.invoice(tenant_id, invoice_id).unwrap();
        assert_eq!(invoice.paid_amount, 1_000);
        assert_eq!(invoice.status, InvoiceStatus::Paid);

        // The credit, not the raw transaction amount, lands as the payment.
        let payments = ledger.payments_for_invoice(tenant_id, invoice_id);
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, 1_000);
        assert_eq!(payments[0].id, matched.payment_id);
    }

    #[test]
    fn record_payment_keeps_paid_amount_in_step() {
        let (ledger, tenant_id, _) = seeded_ledger();
        let invoice = open_invoice(CustomerId::new(), 1_000, 0);
        let invoice_id = invoice.id;
        ledger.insert_invoice(tenant_id, invoice).unwrap();

        ledger
            .record_payment(tenant_id, invoice_id, 400, date(2026, 1, 20))
            .unwrap();
        let partial = ledger.invoice(tenant_id, invoice_id).unwrap();
        assert_eq!(partial.paid_amount, 400);
        assert_eq!(partial.status, InvoiceStatus::Sent);

        ledger
            .record_payment(tenant_id, invoice_id, 600, date(2026, 1, 28))
            .unwrap();
        let settled = ledger.invoice(tenant_id, invoice_id).unwrap();
        assert_eq!(settled.paid_amount, 1_000);
        assert_eq!(settled.status, InvoiceStatus::Paid);

        let recorded: i64 = ledger
            .payments_for_invoice(tenant_id, invoice_id)
            .iter()
            .map(|payment| payment.amount)
            .sum();
        assert_eq!(recorded, settled.paid_amount);

        let err = ledger
            .record_payment(tenant_id, invoice_id, 1, date(2026, 1, 29))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn match_then_revert_restores_paid_amount(
            total in 1_000i64..5_000_000,
            paid_ratio in 0.0f64..0.9,
            amount_ratio in 0.01f64..1.0,
        ) {
            let paid = (total as f64 * paid_ratio) as i64;
            let outstanding = total - paid;
            let amount = ((outstanding as f64 * amount_ratio) as i64).max(1);

            let (ledger, tenant_id, account_id) = seeded_ledger();
            let invoice = open_invoice(CustomerId::new(), total, paid);
            let invoice_id = invoice.id;
            ledger.insert_invoice(tenant_id, invoice).unwrap();

            let transaction = incoming(account_id, amount, "ext-prop");
            let transaction_id = transaction.id;
            ledger
                .insert_transaction_if_absent(tenant_id, transaction)
                .unwrap();

            ledger
                .apply_match(
                    tenant_id,
                    transaction_id,
                    MatchProposal {
                        invoice_id,
                        confidence: 1.0,
                        method: MatchMethod::Manual,
                        amount_tolerance: 0,
                    },
                )
                .unwrap();
            prop_assert_eq!(
                ledger.invoice(tenant_id, invoice_id).unwrap().paid_amount,
                paid + amount
            );

            ledger.revert_match(tenant_id, transaction_id).unwrap();
            let restored = ledger.invoice(tenant_id, invoice_id).unwrap();
            prop_assert_eq!(restored.paid_amount, paid);
            prop_assert!(ledger.payments_for_invoice(tenant_id, invoice_id).is_empty());
            prop_assert!(!ledger
                .transaction(tenant_id, transaction_id)
                .unwrap()
                .is_matched());
        }
    }
}
