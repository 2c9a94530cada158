//! Revenue projection, cash-flow outlook, and the derived analytics on
//! top of the monthly revenue series.
//!
//! Model selection is by history depth: two full years unlock seasonal
//! decomposition, three months a plain fitted line, anything less a flat
//! continuation. Every result names the basis it was computed with so a
//! consumer can tell a rich forecast from a guess.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use finsight_core::{Confidence, EngineError, EngineResult, MonthKey, TenantId};
use finsight_ledger::{LedgerReader, RevenuePoint, monthly_revenue};
use finsight_prediction::PaymentPredictor;

use crate::model::{SeasonalModel, TrendFit, build_seasonal_model, fit_trend};

/// Which model produced a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastBasis {
    /// Fitted trend scaled by calendar-month seasonal indices.
    TrendSeasonal,
    /// Trend line or flat continuation; history too short for seasonality.
    LinearFallback,
}

/// How the model extrapolates, by history depth. Callers only see the
/// coarser [`ForecastBasis`]; a flat continuation is still a (degenerate)
/// linear fallback on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectionMode {
    Seasonal,
    Linear,
    Flat,
}

/// Knobs for model selection and confidence bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Months of history required for seasonal decomposition.
    pub seasonal_min_months: usize,
    /// Months of history required to fit a trend at all.
    pub trend_min_months: usize,
    /// Base half-width of the confidence band, as a share of the expected
    /// value, when the seasonal model is in play.
    pub band_base_ratio: f64,
    /// Extra half-width per month of forecast horizon.
    pub band_widening_per_month: f64,
    /// Base half-width for the fallback and flat models.
    pub fallback_band_ratio: f64,
    /// Window for the rolling average in the growth metrics.
    pub trailing_window_months: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            seasonal_min_months: 24,
            trend_min_months: 3,
            band_base_ratio: 0.10,
            band_widening_per_month: 0.025,
            fallback_band_ratio: 0.20,
            trailing_window_months: 3,
        }
    }
}

/// One projected month with its confidence band, minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: MonthKey,
    pub expected: i64,
    pub lower: i64,
    pub upper: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueForecast {
    pub basis: ForecastBasis,
    /// Months of history the model saw.
    pub history_months: usize,
    pub points: Vec<ForecastPoint>,
}

/// A known monthly outflow (payroll, rent) injected by the caller; the
/// engine never computes these itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringOutflow {
    pub label: String,
    /// Minor units per month.
    pub amount: i64,
}

/// One projected cash-flow period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowPoint {
    pub month: MonthKey,
    /// Outstanding invoices whose predicted settlement lands here.
    pub expected_incoming_existing: i64,
    /// Revenue projection for business not yet invoiced.
    pub projected_new_business: i64,
    pub recurring_outflows: i64,
    pub closing_balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowForecast {
    pub opening_balance: i64,
    /// Basis of the new-business projection.
    pub basis: ForecastBasis,
    pub points: Vec<CashFlowPoint>,
}

/// Seasonal index for one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalityMonth {
    /// Calendar month number, 1 = January.
    pub month: u32,
    pub index: f64,
    /// Years of history contributing to this bucket.
    pub observations: usize,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthMetrics {
    pub latest_month: Option<MonthKey>,
    /// Latest month vs the one before, as a ratio (0.08 = +8%). Absent
    /// when the previous month had no revenue.
    pub month_over_month: Option<f64>,
    /// Rolling mean of the trailing window, minor units.
    pub trailing_average: i64,
    pub trailing_window_months: usize,
    /// Latest month vs the same calendar month a year earlier.
    pub year_over_year: Option<f64>,
}

/// Projected turnover for one calendar year, for VAT-threshold tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnoverProjection {
    pub year: i32,
    /// Receipts recorded in completed months of the year. The current
    /// month counts as projected, not actual.
    pub actual_to_date: i64,
    pub projected_remainder: i64,
    pub projected_total: i64,
    pub basis: ForecastBasis,
}

/// The fitted state shared by all projection entry points.
struct Model {
    mode: ProjectionMode,
    trend: TrendFit,
    seasonal: Option<SeasonalModel>,
    last_value: f64,
    origin: Option<MonthKey>,
    last_month: Option<MonthKey>,
    history_months: usize,
}

impl Model {
    fn basis(&self) -> ForecastBasis {
        match self.mode {
            ProjectionMode::Seasonal => ForecastBasis::TrendSeasonal,
            ProjectionMode::Linear | ProjectionMode::Flat => ForecastBasis::LinearFallback,
        }
    }
}

/// Deterministic revenue and cash-flow projection over ledger history.
pub struct RevenueForecaster<L> {
    ledger: L,
    predictor: PaymentPredictor<L>,
    config: ForecastConfig,
}

impl<L: LedgerReader + Clone> RevenueForecaster<L> {
    pub fn new(ledger: L) -> Self {
        Self::with_config(ledger, ForecastConfig::default())
    }

    pub fn with_config(ledger: L, config: ForecastConfig) -> Self {
        Self {
            predictor: PaymentPredictor::new(ledger.clone()),
            ledger,
            config,
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Project revenue for the given number of months after the recorded
    /// history. With no history at all the point list is empty; that is
    /// an answer, not an error.
    pub fn forecast_revenue(
        &self,
        tenant_id: TenantId,
        months: u32,
    ) -> EngineResult<RevenueForecast> {
        if months == 0 {
            return Err(EngineError::validation(
                "forecast horizon must be at least one month",
            ));
        }
        let series = self.revenue_series(tenant_id);
        let model = self.build_model(&series);

        let mut points = Vec::with_capacity(months as usize);
        if let Some(last) = model.last_month {
            let mut month = last.next();
            for _ in 0..months {
                points.push(self.project_month(&model, month));
                month = month.next();
            }
        }
        Ok(RevenueForecast {
            basis: model.basis(),
            history_months: model.history_months,
            points,
        })
    }

    /// Project the account balance month by month, starting with the
    /// calendar month of `today`.
    ///
    /// Per period: expected settlements of currently open invoices (by the
    /// predictor's expected date; already-overdue money is assumed to land
    /// in the first period) plus projected new business, minus the
    /// injected recurring outflows.
    pub fn forecast_cash_flow(
        &self,
        tenant_id: TenantId,
        months: u32,
        current_balance: i64,
        today: NaiveDate,
        recurring_outflows: &[RecurringOutflow],
    ) -> EngineResult<CashFlowForecast> {
        if months == 0 {
            return Err(EngineError::validation(
                "cash-flow horizon must be at least one month",
            ));
        }
        let series = self.revenue_series(tenant_id);
        let model = self.build_model(&series);
        let first_period = MonthKey::from_date(today);

        let mut expected_existing = vec![0i64; months as usize];
        for invoice in self.ledger.open_invoices(tenant_id) {
            let prediction = self
                .predictor
                .predict_payment(tenant_id, invoice.id, today)?;
            let expected_month = MonthKey::from_date(prediction.expected_payment_date);
            let slot = if expected_month < first_period {
                0
            } else {
                let offset = expected_month.months_since(first_period);
                if offset >= i64::from(months) {
                    // Settles after the window; not this forecast's money.
                    continue;
                }
                offset as usize
            };
            expected_existing[slot] += invoice.outstanding_amount();
        }

        let monthly_outflow: i64 = recurring_outflows.iter().map(|outflow| outflow.amount).sum();

        let mut points = Vec::with_capacity(months as usize);
        let mut balance = current_balance;
        let mut month = first_period;
        for incoming in expected_existing {
            // New business only counts past the recorded history; receipts
            // inside it are already on the balance or expected above.
            let projected_new_business = match model.last_month {
                Some(last) if month <= last => 0,
                _ => self.project_month(&model, month).expected,
            };
            balance = balance + incoming + projected_new_business - monthly_outflow;
            points.push(CashFlowPoint {
                month,
                expected_incoming_existing: incoming,
                projected_new_business,
                recurring_outflows: monthly_outflow,
                closing_balance: balance,
            });
            month = month.next();
        }
        Ok(CashFlowForecast {
            opening_balance: current_balance,
            basis: model.basis(),
            points,
        })
    }

    /// Per-calendar-month seasonal indices. Two full years of backing
    /// lifts a bucket to high confidence; anything less stays low.
    pub fn seasonality_analysis(&self, tenant_id: TenantId) -> Vec<SeasonalityMonth> {
        let series = self.revenue_series(tenant_id);
        let model = build_seasonal_model(&series);
        (0..12)
            .map(|bucket| SeasonalityMonth {
                month: bucket as u32 + 1,
                index: model.indices[bucket],
                observations: model.observations[bucket],
                confidence: if model.observations[bucket] >= 2 {
                    Confidence::High
                } else {
                    Confidence::Low
                },
            })
            .collect()
    }

    /// Growth snapshot of the latest recorded month.
    pub fn growth_metrics(&self, tenant_id: TenantId) -> GrowthMetrics {
        let series = self.revenue_series(tenant_id);
        let window = self.config.trailing_window_months.max(1);
        let Some(latest) = series.last() else {
            return GrowthMetrics {
                latest_month: None,
                month_over_month: None,
                trailing_average: 0,
                trailing_window_months: window,
                year_over_year: None,
            };
        };

        let month_over_month = (series.len() >= 2)
            .then(|| ratio_change(latest.amount, series[series.len() - 2].amount))
            .flatten();

        let tail = &series[series.len().saturating_sub(window)..];
        let trailing_average = (tail.iter().map(|point| point.amount).sum::<i64>() as f64
            / tail.len() as f64)
            .round() as i64;

        let year_over_year = MonthKey::new(latest.month.year() - 1, latest.month.month())
            .ok()
            .and_then(|target| {
                series
                    .iter()
                    .find(|point| point.month == target)
                    .and_then(|point| ratio_change(latest.amount, point.amount))
            });

        GrowthMetrics {
            latest_month: Some(latest.month),
            month_over_month,
            trailing_average,
            trailing_window_months: window,
            year_over_year,
        }
    }

    /// Actual receipts for completed months of `year` plus the projection
    /// for the rest of it.
    pub fn predict_annual_turnover(
        &self,
        tenant_id: TenantId,
        year: i32,
        today: NaiveDate,
    ) -> EngineResult<TurnoverProjection> {
        let current = MonthKey::from_date(today);
        let series = self.revenue_series(tenant_id);
        let model = self.build_model(&series);

        let mut actual_to_date = 0i64;
        let mut projected_remainder = 0i64;
        for month_number in 1..=12u32 {
            let month = MonthKey::new(year, month_number)?;
            if month < current {
                actual_to_date += series
                    .iter()
                    .find(|point| point.month == month)
                    .map_or(0, |point| point.amount);
            } else {
                projected_remainder += self.project_month(&model, month).expected;
            }
        }
        Ok(TurnoverProjection {
            year,
            actual_to_date,
            projected_remainder,
            projected_total: actual_to_date + projected_remainder,
            basis: model.basis(),
        })
    }

    fn revenue_series(&self, tenant_id: TenantId) -> Vec<RevenuePoint> {
        monthly_revenue(&self.ledger.payments(tenant_id))
    }

    fn build_model(&self, series: &[RevenuePoint]) -> Model {
        let values: Vec<f64> = series.iter().map(|point| point.amount as f64).collect();
        let history_months = series.len();
        let mode = if history_months >= self.config.seasonal_min_months {
            ProjectionMode::Seasonal
        } else if history_months >= self.config.trend_min_months {
            ProjectionMode::Linear
        } else {
            ProjectionMode::Flat
        };
        Model {
            mode,
            trend: fit_trend(&values),
            seasonal: (mode == ProjectionMode::Seasonal).then(|| build_seasonal_model(series)),
            last_value: values.last().copied().unwrap_or(0.0),
            origin: series.first().map(|point| point.month),
            last_month: series.last().map(|point| point.month),
            history_months,
        }
    }

    fn project_month(&self, model: &Model, month: MonthKey) -> ForecastPoint {
        let index = model
            .origin
            .map_or(0.0, |origin| month.months_since(origin) as f64);
        let raw = match model.mode {
            ProjectionMode::Seasonal => {
                let seasonal = model
                    .seasonal
                    .as_ref()
                    .map_or(1.0, |seasonal| seasonal.indices[(month.month() - 1) as usize]);
                model.trend.at(index).max(0.0) * seasonal
            }
            ProjectionMode::Linear => model.trend.at(index).max(0.0),
            ProjectionMode::Flat => model.last_value.max(0.0),
        };

        // Bands widen monotonically with the horizon.
        let horizon = model
            .last_month
            .map_or(1, |last| month.months_since(last).max(1));
        let base_ratio = match model.mode {
            ProjectionMode::Seasonal => self.config.band_base_ratio,
            ProjectionMode::Linear | ProjectionMode::Flat => self.config.fallback_band_ratio,
        };
        let ratio = base_ratio + self.config.band_widening_per_month * horizon as f64;
        ForecastPoint {
            month,
            expected: raw.round() as i64,
            lower: (raw * (1.0 - ratio)).max(0.0).round() as i64,
            upper: (raw * (1.0 + ratio)).round() as i64,
        }
    }
}

fn ratio_change(current: i64, baseline: i64) -> Option<f64> {
    (baseline > 0).then(|| (current - baseline) as f64 / baseline as f64)
}
