//! Per-customer payment behavior model and per-invoice settlement
//! prediction.
//!
//! Everything here is a deterministic function of ledger history: same
//! rows in, same numbers out. Missing history is a legitimate input and
//! produces a low-confidence result, never an error; only unknown ids
//! report `NotFound`.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use finsight_core::{Confidence, CustomerId, EngineResult, InvoiceId, TenantId};
use finsight_ledger::{Invoice, InvoiceStatus, LedgerReader};

use crate::stats::{CustomerPaymentStats, PaymentTrend, mean, stddev_sample, trend_of};

const TREND_WEIGHT: f64 = 0.05;
const OVERDUE_WEIGHT_STEP: f64 = 0.08;
const OVERDUE_COUNT_CAP: usize = 5;
const LARGE_AMOUNT_WEIGHT: f64 = 0.15;
const SMALL_AMOUNT_WEIGHT: f64 = 0.05;
const LATE_ISSUE_WEIGHT: f64 = 0.05;
const EARLY_ISSUE_WEIGHT: f64 = 0.03;

/// Knobs for history aggregation and risk flagging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Resolved invoices required before a customer's own averages are
    /// trusted over the tenant-wide baseline.
    pub min_history: usize,
    /// Bounds for the predicted offset from the due date, in days.
    pub offset_clamp_days: (i64, i64),
    /// Shifts of mean days-to-pay smaller than this read as noise when
    /// classifying the trend.
    pub trend_dead_band_days: f64,
    /// Customers whose on-time probability falls below this are flagged.
    pub risk_probability_threshold: f64,
    /// Customers whose overdue share of outstanding balance exceeds this
    /// are flagged.
    pub risk_overdue_ratio_threshold: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            offset_clamp_days: (-30, 180),
            trend_dead_band_days: 1.5,
            risk_probability_threshold: 0.4,
            risk_overdue_ratio_threshold: 0.5,
        }
    }
}

/// One explainable contribution to an on-time probability.
///
/// The weights of all factors sum to the probability before clamping, so
/// a consumer can show exactly what pushed a prediction up or down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionFactor {
    pub name: String,
    /// Signed probability shift; negative pushes toward late payment.
    pub weight: f64,
    pub description: String,
}

/// Settlement prediction for one invoice. Computed on demand, never
/// persisted as source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPrediction {
    pub invoice_id: InvoiceId,
    pub customer_id: CustomerId,
    /// Due date plus the customer's clamped mean days-to-pay.
    pub expected_payment_date: NaiveDate,
    /// Probability the invoice settles on or before its due date, in
    /// \[0, 1\].
    pub on_time_probability: f64,
    pub confidence: Confidence,
    pub factors: Vec<PredictionFactor>,
}

/// A customer flagged by the risk scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRisk {
    pub customer_id: CustomerId,
    pub display_name: String,
    pub on_time_probability: f64,
    /// Overdue share of the customer's outstanding balance, in \[0, 1\].
    pub overdue_ratio: f64,
    pub outstanding_amount: i64,
    /// Sort key in \[0, 1\]; the worse of the two flag signals.
    pub risk_score: f64,
    pub reasons: Vec<String>,
    pub confidence: Confidence,
}

/// One resolved invoice reduced to the numbers the model needs.
struct ResolvedRow {
    settled_on: NaiveDate,
    offset_days: f64,
    on_time: bool,
    total_amount: i64,
}

struct PopulationStats {
    mean_days_to_pay: f64,
    stddev_days_to_pay: f64,
    on_time_ratio: f64,
}

/// Deterministic payment-behavior model over resolved invoice history.
pub struct PaymentPredictor<L> {
    ledger: L,
    config: PredictorConfig,
}

impl<L: LedgerReader> PaymentPredictor<L> {
    pub fn new(ledger: L) -> Self {
        Self::with_config(ledger, PredictorConfig::default())
    }

    pub fn with_config(ledger: L, config: PredictorConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Aggregate a customer's settlement history.
    ///
    /// Below `min_history` resolved invoices the averages fall back to
    /// tenant-wide figures and confidence drops to low; that is a valid
    /// answer, not an error.
    pub fn customer_stats(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> EngineResult<CustomerPaymentStats> {
        self.ledger.customer(tenant_id, customer_id)?;
        let history = self.resolved_history(tenant_id, customer_id);
        let offsets: Vec<f64> = history.iter().map(|row| row.offset_days).collect();
        let sample_size = offsets.len();

        if sample_size >= self.config.min_history {
            let mean_days = mean(&offsets);
            return Ok(CustomerPaymentStats {
                customer_id,
                sample_size,
                mean_days_to_pay: mean_days,
                stddev_days_to_pay: stddev_sample(&offsets, mean_days),
                on_time_ratio: on_time_ratio(&history),
                trend: trend_of(&offsets, self.config.trend_dead_band_days),
                confidence: Confidence::from_sample_size(sample_size, self.config.min_history),
                population_fallback: false,
            });
        }

        let population = self.population_stats(tenant_id);
        Ok(CustomerPaymentStats {
            customer_id,
            sample_size,
            mean_days_to_pay: population.mean_days_to_pay,
            stddev_days_to_pay: population.stddev_days_to_pay,
            on_time_ratio: if sample_size == 0 {
                population.on_time_ratio
            } else {
                on_time_ratio(&history)
            },
            trend: PaymentTrend::Stable,
            confidence: Confidence::Low,
            population_fallback: true,
        })
    }

    /// Predict when an invoice will settle and how likely it is to settle
    /// on time.
    pub fn predict_payment(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        today: NaiveDate,
    ) -> EngineResult<PaymentPrediction> {
        let invoice = self.ledger.invoice(tenant_id, invoice_id)?;
        if let Some(prediction) = self.settled_prediction(tenant_id, &invoice) {
            return Ok(prediction);
        }
        let stats = self.customer_stats(tenant_id, invoice.customer_id)?;
        let history = self.resolved_history(tenant_id, invoice.customer_id);

        let mut factors = Vec::new();
        factors.push(PredictionFactor {
            name: "payment_history".to_string(),
            weight: stats.on_time_ratio,
            description: if stats.population_fallback {
                format!(
                    "tenant-wide baseline used; customer has {} resolved invoices",
                    stats.sample_size
                )
            } else {
                format!(
                    "{:.0}% of {} resolved invoices settled on time",
                    stats.on_time_ratio * 100.0,
                    stats.sample_size
                )
            },
        });

        match stats.trend {
            PaymentTrend::Improving => factors.push(PredictionFactor {
                name: "trend".to_string(),
                weight: TREND_WEIGHT,
                description: "recent invoices settle sooner than older ones".to_string(),
            }),
            PaymentTrend::Worsening => factors.push(PredictionFactor {
                name: "trend".to_string(),
                weight: -TREND_WEIGHT,
                description: "recent invoices settle later than older ones".to_string(),
            }),
            PaymentTrend::Stable => {}
        }

        let totals: Vec<f64> = history.iter().map(|row| row.total_amount as f64).collect();
        let average_total = mean(&totals);
        if average_total > 0.0 && invoice.total_amount > 0 {
            let ratio = invoice.total_amount as f64 / average_total;
            let weight = if ratio > 1.0 {
                -LARGE_AMOUNT_WEIGHT * (ratio - 1.0).min(1.0)
            } else {
                SMALL_AMOUNT_WEIGHT * (1.0 - ratio)
            };
            factors.push(PredictionFactor {
                name: "amount_vs_history".to_string(),
                weight,
                description: format!("amount is {ratio:.2}x the customer's average invoice"),
            });
        }

        let overdue_count = self.overdue_count(tenant_id, invoice.customer_id, invoice.id, today);
        if overdue_count > 0 {
            factors.push(PredictionFactor {
                name: "open_overdue_invoices".to_string(),
                weight: -OVERDUE_WEIGHT_STEP * overdue_count.min(OVERDUE_COUNT_CAP) as f64,
                description: format!("customer currently has {overdue_count} invoice(s) past due"),
            });
        }

        let issue_day = invoice.issue_date.day();
        let issue_weight = if issue_day >= 25 {
            -LATE_ISSUE_WEIGHT
        } else if issue_day <= 10 {
            EARLY_ISSUE_WEIGHT
        } else {
            0.0
        };
        if issue_weight != 0.0 {
            factors.push(PredictionFactor {
                name: "issue_day_of_month".to_string(),
                weight: issue_weight,
                description: format!("issued on day {issue_day} of the month"),
            });
        }

        let on_time_probability = factors
            .iter()
            .map(|factor| factor.weight)
            .sum::<f64>()
            .clamp(0.0, 1.0);

        let (clamp_min, clamp_max) = self.config.offset_clamp_days;
        let offset = (stats.mean_days_to_pay.round() as i64).clamp(clamp_min, clamp_max);

        Ok(PaymentPrediction {
            invoice_id,
            customer_id: invoice.customer_id,
            expected_payment_date: invoice.due_date + Duration::days(offset),
            on_time_probability,
            confidence: stats.confidence,
            factors,
        })
    }

    /// Scan active customers and return the flagged ones, worst first.
    ///
    /// A customer is flagged when the on-time probability falls below the
    /// configured threshold or the overdue share of their outstanding
    /// balance exceeds its threshold.
    pub fn risky_customers(
        &self,
        tenant_id: TenantId,
        today: NaiveDate,
    ) -> EngineResult<Vec<CustomerRisk>> {
        let mut risks = Vec::new();
        for customer in self.ledger.customers(tenant_id) {
            if !customer.active {
                continue;
            }
            let stats = self.customer_stats(tenant_id, customer.id)?;
            let open: Vec<Invoice> = self
                .ledger
                .invoices_for_customer(tenant_id, customer.id)
                .into_iter()
                .filter(|invoice| invoice.is_open())
                .collect();
            let outstanding: i64 = open.iter().map(|invoice| invoice.outstanding_amount()).sum();
            let overdue: Vec<&Invoice> = open
                .iter()
                .filter(|invoice| invoice.is_overdue_on(today))
                .collect();
            let overdue_outstanding: i64 = overdue
                .iter()
                .map(|invoice| invoice.outstanding_amount())
                .sum();
            let overdue_ratio = if outstanding > 0 {
                overdue_outstanding as f64 / outstanding as f64
            } else {
                0.0
            };
            let on_time_probability = base_probability(&stats, overdue.len());

            let mut reasons = Vec::new();
            if on_time_probability < self.config.risk_probability_threshold {
                reasons.push(format!(
                    "on-time probability {:.2} is below the {:.2} threshold",
                    on_time_probability, self.config.risk_probability_threshold
                ));
            }
            if overdue_ratio > self.config.risk_overdue_ratio_threshold {
                reasons.push(format!(
                    "{:.0}% of the outstanding balance is past due",
                    overdue_ratio * 100.0
                ));
            }
            if reasons.is_empty() {
                continue;
            }
            risks.push(CustomerRisk {
                customer_id: customer.id,
                display_name: customer.display_name.clone(),
                on_time_probability,
                overdue_ratio,
                outstanding_amount: outstanding,
                risk_score: (1.0 - on_time_probability).max(overdue_ratio),
                reasons,
                confidence: stats.confidence,
            });
        }
        risks.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
        Ok(risks)
    }

    /// Resolved invoices with a known settlement date, oldest settlement
    /// first.
    fn resolved_history(&self, tenant_id: TenantId, customer_id: CustomerId) -> Vec<ResolvedRow> {
        let mut rows: Vec<ResolvedRow> = self
            .ledger
            .invoices_for_customer(tenant_id, customer_id)
            .into_iter()
            .filter(Invoice::is_resolved)
            .filter_map(|invoice| self.resolved_row(tenant_id, &invoice))
            .collect();
        rows.sort_by_key(|row| row.settled_on);
        rows
    }

    /// Prediction for an invoice that is already off the table: settled
    /// invoices report their recorded outcome, drafts and cancelled
    /// invoices are not expected to settle at all.
    fn settled_prediction(
        &self,
        tenant_id: TenantId,
        invoice: &Invoice,
    ) -> Option<PaymentPrediction> {
        let (expected, factor) = match invoice.status {
            InvoiceStatus::Paid => {
                let settled_on = self
                    .resolved_row(tenant_id, invoice)
                    .map_or(invoice.due_date, |row| row.settled_on);
                let on_time = settled_on <= invoice.due_date;
                (
                    settled_on,
                    PredictionFactor {
                        name: "already_settled".to_string(),
                        weight: if on_time { 1.0 } else { 0.0 },
                        description: format!(
                            "invoice settled on {settled_on}, {} the due date",
                            if on_time { "on or before" } else { "after" }
                        ),
                    },
                )
            }
            InvoiceStatus::Draft | InvoiceStatus::Cancelled => (
                invoice.due_date,
                PredictionFactor {
                    name: "not_in_collection".to_string(),
                    weight: 0.0,
                    description: format!(
                        "invoice is {:?} and outside the payment lifecycle",
                        invoice.status
                    ),
                },
            ),
            InvoiceStatus::Sent | InvoiceStatus::Overdue => return None,
        };
        Some(PaymentPrediction {
            invoice_id: invoice.id,
            customer_id: invoice.customer_id,
            expected_payment_date: expected,
            on_time_probability: factor.weight,
            confidence: Confidence::High,
            factors: vec![factor],
        })
    }

    fn resolved_row(&self, tenant_id: TenantId, invoice: &Invoice) -> Option<ResolvedRow> {
        let settled_on = self
            .ledger
            .payments_for_invoice(tenant_id, invoice.id)
            .iter()
            .map(|payment| payment.paid_at)
            .max()?;
        Some(ResolvedRow {
            settled_on,
            offset_days: (settled_on - invoice.due_date).num_days() as f64,
            on_time: settled_on <= invoice.due_date,
            total_amount: invoice.total_amount,
        })
    }

    /// Tenant-wide settlement statistics, the fallback for thin histories.
    fn population_stats(&self, tenant_id: TenantId) -> PopulationStats {
        let rows: Vec<ResolvedRow> = self
            .ledger
            .invoices(tenant_id)
            .into_iter()
            .filter(Invoice::is_resolved)
            .filter_map(|invoice| self.resolved_row(tenant_id, &invoice))
            .collect();
        if rows.is_empty() {
            // No settlement history anywhere in the tenant: a neutral prior.
            return PopulationStats {
                mean_days_to_pay: 0.0,
                stddev_days_to_pay: 0.0,
                on_time_ratio: 0.5,
            };
        }
        let offsets: Vec<f64> = rows.iter().map(|row| row.offset_days).collect();
        let mean_days = mean(&offsets);
        PopulationStats {
            mean_days_to_pay: mean_days,
            stddev_days_to_pay: stddev_sample(&offsets, mean_days),
            on_time_ratio: on_time_ratio(&rows),
        }
    }

    fn overdue_count(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        exclude: InvoiceId,
        today: NaiveDate,
    ) -> usize {
        self.ledger
            .invoices_for_customer(tenant_id, customer_id)
            .iter()
            .filter(|invoice| invoice.id != exclude && invoice.is_overdue_on(today))
            .count()
    }
}

fn on_time_ratio(rows: &[ResolvedRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().filter(|row| row.on_time).count() as f64 / rows.len() as f64
}

/// Probability of on-time payment from history alone, without
/// invoice-specific signals. Monotonically non-increasing in the overdue
/// count.
fn base_probability(stats: &CustomerPaymentStats, overdue_count: usize) -> f64 {
    let trend_weight = match stats.trend {
        PaymentTrend::Improving => TREND_WEIGHT,
        PaymentTrend::Stable => 0.0,
        PaymentTrend::Worsening => -TREND_WEIGHT,
    };
    let overdue_weight = -OVERDUE_WEIGHT_STEP * overdue_count.min(OVERDUE_COUNT_CAP) as f64;
    (stats.on_time_ratio + trend_weight + overdue_weight).clamp(0.0, 1.0)
}
