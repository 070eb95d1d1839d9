//! Fit-quality diagnostics for the two models.

use cltv_model::{count_model::FittedCountModel, error::ComputationError, record::CustomerRecord};
use cltv_stats::descriptive::pearson_correlation;
use serde::{Deserialize, Serialize};

/// Observed and model-expected number of customers with a given frequency.
///
/// The last row of a table aggregates every frequency at or above its
/// `frequency` and has `open_ended` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTransactionsRow {
    pub frequency: u32,
    pub open_ended: bool,
    pub observed: usize,
    pub expected: f64,
}

/// Compares the observed frequency distribution with the one implied by the
/// count model.
///
/// The expected count for frequency `k` is `Σ_i P(X(tenure_i) = k)` over all
/// customers; rows cover `0..max_frequency`, plus an open-ended row holding
/// the remainder.
pub fn period_transactions(
    model: &FittedCountModel,
    records: &[CustomerRecord],
    max_frequency: u32,
) -> Result<Vec<PeriodTransactionsRow>, ComputationError> {
    let mut rows = (0..=max_frequency)
        .map(|frequency| PeriodTransactionsRow {
            frequency,
            open_ended: frequency == max_frequency,
            observed: 0,
            expected: 0.0,
        })
        .collect::<Vec<_>>();

    for record in records {
        let bucket = record.frequency.min(max_frequency) as usize;
        rows[bucket].observed += 1;

        let mut closed = 0.0;
        for row in &mut rows[..max_frequency as usize] {
            let p = model.probability_of_purchases(row.frequency, record.tenure)?;
            row.expected += p;
            closed += p;
        }
        rows[max_frequency as usize].expected += (1.0 - closed).max(0.0);
    }
    Ok(rows)
}

/// Pearson correlation between frequency and average purchase value.
///
/// The value model assumes the two are independent; a correlation far from
/// zero signals that the assumption is violated. Returns `None` when fewer
/// than two records exist or either column is constant.
#[must_use]
pub fn frequency_monetary_correlation(records: &[CustomerRecord]) -> Option<f64> {
    let frequencies = records
        .iter()
        .map(|r| f64::from(r.frequency))
        .collect::<Vec<_>>();
    let values = records.iter().map(|r| r.monetary_avg).collect::<Vec<_>>();
    pearson_correlation(&frequencies, &values)
}

/// Diagnostics reported after a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Mean per-customer log-likelihood of the count model.
    pub count_model_mean_log_likelihood: f64,
    pub frequency_monetary_correlation: Option<f64>,
    pub period_transactions: Vec<PeriodTransactionsRow>,
}

impl FitDiagnostics {
    pub fn compute(
        model: &FittedCountModel,
        records: &[CustomerRecord],
        max_frequency: u32,
    ) -> Result<Self, ComputationError> {
        #[expect(clippy::cast_precision_loss)]
        let count_model_mean_log_likelihood = records
            .iter()
            .map(|r| model.log_likelihood(r.frequency, r.recency, r.tenure))
            .sum::<f64>()
            / records.len().max(1) as f64;
        let frequency_monetary_correlation = frequency_monetary_correlation(records);
        if let Some(correlation) = frequency_monetary_correlation.filter(|c| c.abs() > 0.3) {
            tracing::warn!(
                correlation,
                "frequency and average value are correlated; the value model assumes independence"
            );
        }
        Ok(Self {
            count_model_mean_log_likelihood,
            frequency_monetary_correlation,
            period_transactions: period_transactions(model, records, max_frequency)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frequency: u32, monetary_avg: f64) -> CustomerRecord {
        CustomerRecord {
            customer_id: format!("f{frequency}"),
            frequency,
            recency: 5.0,
            tenure: 30.0,
            monetary_avg,
        }
    }

    #[test]
    fn test_period_transactions_totals() {
        let model = FittedCountModel::new(0.243, 4.414, 0.793, 2.426).unwrap();
        let records = [record(0, 10.0), record(1, 12.0), record(3, 8.0), record(9, 30.0)];
        let rows = period_transactions(&model, &records, 5).unwrap();

        assert_eq!(rows.len(), 6);
        assert!(rows[5].open_ended);
        assert!(!rows[4].open_ended);
        assert_eq!(
            rows.iter().map(|r| r.observed).collect::<Vec<_>>(),
            [1, 1, 0, 1, 0, 1]
        );
        let expected_total = rows.iter().map(|r| r.expected).sum::<f64>();
        assert!((expected_total - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlation() {
        let records = [record(2, 10.0), record(4, 20.0), record(6, 30.0)];
        let correlation = frequency_monetary_correlation(&records).unwrap();
        assert!((correlation - 1.0).abs() < 1e-12);
        assert_eq!(frequency_monetary_correlation(&records[..1]), None);
    }
}
