//! Pure numeric pieces of the revenue model: trend fitting and the
//! seasonal index table.

use std::collections::BTreeMap;

use finsight_ledger::RevenuePoint;

/// Least-squares line through `(index, value)` with 0-based indices.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendFit {
    pub fn at(&self, index: f64) -> f64 {
        self.intercept + self.slope * index
    }
}

pub(crate) fn fit_trend(values: &[f64]) -> TrendFit {
    if values.is_empty() {
        return TrendFit {
            slope: 0.0,
            intercept: 0.0,
        };
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, value) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxx += dx * dx;
        sxy += dx * (value - mean_y);
    }
    let slope = if sxx == 0.0 { 0.0 } else { sxy / sxx };
    TrendFit {
        slope,
        intercept: mean_y - slope * mean_x,
    }
}

/// Multiplicative calendar-month indices and the history depth behind
/// each bucket.
#[derive(Debug, Clone)]
pub(crate) struct SeasonalModel {
    /// One index per calendar month, January first. The indices average
    /// to 1 so they redistribute the trend across the year instead of
    /// rescaling it.
    pub indices: [f64; 12],
    /// Full years of history contributing to each bucket.
    pub observations: [usize; 12],
}

/// Average each month's revenue-to-year-mean ratio across full calendar
/// years. Partial boundary years are skipped entirely: their means are
/// not comparable and a stray month would both dilute its index and
/// inflate the bucket's observation count.
pub(crate) fn build_seasonal_model(series: &[RevenuePoint]) -> SeasonalModel {
    let mut by_year: BTreeMap<i32, Vec<&RevenuePoint>> = BTreeMap::new();
    for point in series {
        by_year.entry(point.month.year()).or_default().push(point);
    }

    let mut sums = [0.0f64; 12];
    let mut observations = [0usize; 12];
    for points in by_year.values() {
        if points.len() < 12 {
            continue;
        }
        let year_mean =
            points.iter().map(|point| point.amount as f64).sum::<f64>() / points.len() as f64;
        if year_mean <= 0.0 {
            continue;
        }
        for point in points {
            let bucket = (point.month.month() - 1) as usize;
            sums[bucket] += point.amount as f64 / year_mean;
            observations[bucket] += 1;
        }
    }

    let mut indices = [1.0f64; 12];
    for bucket in 0..12 {
        if observations[bucket] > 0 {
            indices[bucket] = sums[bucket] / observations[bucket] as f64;
        }
    }
    let mean_index = indices.iter().sum::<f64>() / 12.0;
    if mean_index > 0.0 {
        for index in &mut indices {
            *index /= mean_index;
        }
    }
    SeasonalModel {
        indices,
        observations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::MonthKey;

    fn series(start_year: i32, amounts: &[i64]) -> Vec<RevenuePoint> {
        let mut month = MonthKey::new(start_year, 1).unwrap();
        amounts
            .iter()
            .map(|&amount| {
                let point = RevenuePoint { month, amount };
                month = month.next();
                point
            })
            .collect()
    }

    #[test]
    fn fit_recovers_a_known_line() {
        // y = 200x + 1000
        let fit = fit_trend(&[1000.0, 1200.0, 1400.0, 1600.0, 1800.0]);
        assert!((fit.slope - 200.0).abs() < 1e-9);
        assert!((fit.intercept - 1000.0).abs() < 1e-9);
        assert!((fit.at(6.0) - 2200.0).abs() < 1e-9);
    }

    #[test]
    fn flat_series_fits_a_zero_slope() {
        let fit = fit_trend(&[500.0, 500.0, 500.0]);
        assert_eq!(fit.slope, 0.0);
        assert!((fit.at(10.0) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn seasonal_indices_average_to_one() {
        // Two years, June double the usual volume.
        let mut amounts = vec![10_000i64; 24];
        amounts[5] = 20_000;
        amounts[17] = 20_000;
        let model = build_seasonal_model(&series(2024, &amounts));

        let mean: f64 = model.indices.iter().sum::<f64>() / 12.0;
        assert!((mean - 1.0).abs() < 1e-9);
        // June carries the highest index and two years of backing.
        let june = model.indices[5];
        assert!(june > 1.5);
        for (bucket, index) in model.indices.iter().enumerate() {
            if bucket != 5 {
                assert!(*index < june);
            }
        }
        assert_eq!(model.observations[5], 2);
    }

    #[test]
    fn a_partial_boundary_year_contributes_nothing() {
        // Jan 2024..=Jan 2025: the stray January belongs to a 1-month
        // year and must not count as a second observation or skew the
        // January index.
        let mut amounts = vec![10_000i64; 13];
        amounts[12] = 50_000;
        let model = build_seasonal_model(&series(2024, &amounts));

        assert_eq!(model.observations[0], 1);
        assert!((model.indices[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_series_yields_neutral_indices() {
        let model = build_seasonal_model(&[]);
        assert!(model.indices.iter().all(|index| (*index - 1.0).abs() < 1e-9));
        assert!(model.observations.iter().all(|count| *count == 0));
    }
}
