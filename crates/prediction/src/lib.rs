//! `finsight-prediction` — payment behavior statistics and settlement
//! prediction over ledger history.

pub mod predictor;
pub mod stats;

pub use predictor::{
    CustomerRisk, PaymentPrediction, PaymentPredictor, PredictionFactor, PredictorConfig,
};
pub use stats::{CustomerPaymentStats, PaymentTrend};
