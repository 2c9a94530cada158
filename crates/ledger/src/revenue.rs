//! Monthly revenue series derived from recorded payments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use finsight_core::MonthKey;

use crate::invoice::Payment;

/// One month of received revenue, in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub month: MonthKey,
    pub amount: i64,
}

/// Bucket payments into a contiguous monthly series.
///
/// Revenue is recognized on receipt, so each payment lands in the month of
/// its `paid_at` date. Months between the first and last receipt with no
/// payments appear as explicit zero points; trend fitting needs an
/// unbroken time axis.
pub fn monthly_revenue(payments: &[Payment]) -> Vec<RevenuePoint> {
    let mut buckets: BTreeMap<MonthKey, i64> = BTreeMap::new();
    for payment in payments {
        *buckets
            .entry(MonthKey::from_date(payment.paid_at))
            .or_insert(0) += payment.amount;
    }
    let Some(first) = buckets.keys().next().copied() else {
        return Vec::new();
    };
    let last = buckets.keys().next_back().copied().unwrap_or(first);

    let mut series = Vec::new();
    let mut month = first;
    loop {
        series.push(RevenuePoint {
            month,
            amount: buckets.get(&month).copied().unwrap_or(0),
        });
        if month == last {
            break;
        }
        month = month.next();
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finsight_core::{InvoiceId, PaymentId};

    fn payment(y: i32, m: u32, d: u32, amount: i64) -> Payment {
        Payment {
            id: PaymentId::new(),
            invoice_id: InvoiceId::new(),
            amount,
            paid_at: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        }
    }

    #[test]
    fn empty_history_gives_empty_series() {
        assert!(monthly_revenue(&[]).is_empty());
    }

    #[test]
    fn same_month_payments_are_summed() {
        let series = monthly_revenue(&[
            payment(2026, 3, 2, 400),
            payment(2026, 3, 28, 600),
        ]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].month, MonthKey::new(2026, 3).unwrap());
        assert_eq!(series[0].amount, 1_000);
    }

    #[test]
    fn quiet_months_become_explicit_zeros() {
        let series = monthly_revenue(&[
            payment(2025, 11, 15, 2_000),
            payment(2026, 2, 1, 3_000),
        ]);
        let amounts: Vec<i64> = series.iter().map(|point| point.amount).collect();
        assert_eq!(amounts, vec![2_000, 0, 0, 3_000]);
        assert_eq!(series[0].month, MonthKey::new(2025, 11).unwrap());
        assert_eq!(series[3].month, MonthKey::new(2026, 2).unwrap());
    }
}
