//! Payment behavior statistics and the small numeric helpers behind them.

use serde::{Deserialize, Serialize};

use finsight_core::{Confidence, CustomerId};

/// Direction of a customer's payment discipline over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTrend {
    /// Recent invoices settle sooner relative to their due dates.
    Improving,
    Stable,
    /// Recent invoices settle later relative to their due dates.
    Worsening,
}

/// Aggregated payment behavior for one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerPaymentStats {
    pub customer_id: CustomerId,
    /// Resolved invoices with a known settlement date backing the averages.
    pub sample_size: usize,
    /// Mean of settlement date minus due date, in days; negative means the
    /// customer usually pays early.
    pub mean_days_to_pay: f64,
    pub stddev_days_to_pay: f64,
    /// Fraction of resolved invoices settled on or before the due date.
    pub on_time_ratio: f64,
    pub trend: PaymentTrend,
    pub confidence: Confidence,
    /// True when the averages come from tenant-wide history because the
    /// customer's own sample is below the configured minimum.
    pub population_fallback: bool,
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn stddev_sample(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Compare the most recent third of the history with the earliest third.
///
/// `offsets` must be in chronological order. Differences inside the dead
/// band read as noise, not a trend.
pub(crate) fn trend_of(offsets: &[f64], dead_band_days: f64) -> PaymentTrend {
    if offsets.len() < 3 {
        return PaymentTrend::Stable;
    }
    let third = offsets.len() / 3;
    let early = mean(&offsets[..third]);
    let recent = mean(&offsets[offsets.len() - third..]);
    let delta = recent - early;
    if delta.abs() <= dead_band_days {
        PaymentTrend::Stable
    } else if delta < 0.0 {
        PaymentTrend::Improving
    } else {
        PaymentTrend::Worsening
    }
}
