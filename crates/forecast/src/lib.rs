//! `finsight-forecast` — revenue and cash-flow projection over the
//! monthly receipt history.

pub mod forecaster;
mod model;

pub use forecaster::{
    CashFlowForecast, CashFlowPoint, ForecastBasis, ForecastConfig, ForecastPoint, GrowthMetrics,
    RecurringOutflow, RevenueForecast, RevenueForecaster, SeasonalityMonth, TurnoverProjection,
};
