//! Discounted customer lifetime value over a forecast horizon.
//!
//! The horizon, in months, is cut into monthly steps. Step `k` covers model
//! time `[(k - 1)·f, k·f]`, where `f` is the number of time units per month,
//! and contributes
//!
//! ```text
//! expected_average_value × expected_transactions_in_step(k) / (1 + discount_rate)^k
//! ```
//!
//! A fractional horizon ends with a partial step that keeps the discount
//! exponent of the month it falls in, so the value never decreases as the
//! horizon grows.

use std::{panic, thread};

use serde::{Deserialize, Serialize};

use crate::{
    config::{ModelConfig, TimeUnit},
    count_model::{FittedCountModel, check_horizon},
    error::{ComputationError, FitError},
    record::CustomerRecord,
    value_model::FittedValueModel,
};

/// Both fitted models of a scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedModels {
    pub count_model: FittedCountModel,
    pub value_model: FittedValueModel,
}

impl FittedModels {
    /// Fits the count and value models on two threads.
    ///
    /// The fits are independent; the first error in `(count, value)` order is
    /// returned.
    pub fn fit(records: &[CustomerRecord], config: &ModelConfig) -> Result<Self, FitError> {
        let (count_model, value_model) = thread::scope(|s| {
            let count = s.spawn(|| FittedCountModel::fit(records, config));
            let value = FittedValueModel::fit(records, config);
            let count = count
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload));
            (count, value)
        });
        Ok(Self {
            count_model: count_model?,
            value_model: value_model?,
        })
    }

    /// Scores one customer over `config.horizon_months`.
    pub fn score(
        &self,
        record: &CustomerRecord,
        config: &ModelConfig,
    ) -> Result<LifetimeValue, ComputationError> {
        lifetime_value(
            &self.count_model,
            &self.value_model,
            record,
            config.horizon_months,
            config.time_unit,
            config.discount_rate,
        )
    }
}

/// Per-customer result of the combiner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifetimeValue {
    /// Undiscounted expected number of purchases over the horizon.
    pub expected_transactions: f64,
    /// Shrinkage estimate of the average purchase value.
    pub expected_average_value: f64,
    /// Discounted expected revenue over the horizon.
    pub cltv: f64,
}

/// Discounted lifetime value of `record` over `horizon_months`.
///
/// Returns 0 for a zero horizon. Non-decreasing in `horizon_months` and
/// non-increasing in `discount_rate`.
///
/// # Errors
///
/// - [`ComputationError::InvalidHorizon`] if `horizon_months` is negative or
///   not finite
/// - [`ComputationError::InvalidDiscountRate`] if `discount_rate` is negative
///   or not finite
/// - any error of the underlying model predictions
pub fn compute_cltv(
    count_model: &FittedCountModel,
    value_model: &FittedValueModel,
    record: &CustomerRecord,
    horizon_months: f64,
    time_unit: TimeUnit,
    discount_rate: f64,
) -> Result<f64, ComputationError> {
    lifetime_value(
        count_model,
        value_model,
        record,
        horizon_months,
        time_unit,
        discount_rate,
    )
    .map(|value| value.cltv)
}

/// Like [`compute_cltv`], also returning the two model estimates it combines.
pub fn lifetime_value(
    count_model: &FittedCountModel,
    value_model: &FittedValueModel,
    record: &CustomerRecord,
    horizon_months: f64,
    time_unit: TimeUnit,
    discount_rate: f64,
) -> Result<LifetimeValue, ComputationError> {
    check_horizon(horizon_months)?;
    if !(discount_rate.is_finite() && discount_rate >= 0.0) {
        return Err(ComputationError::InvalidDiscountRate {
            rate: discount_rate,
        });
    }

    let expected_average_value =
        value_model.expected_average_value(record.frequency, record.monetary_avg)?;
    let periods_per_month = time_unit.periods_per_month();
    let cumulative = |months: f64| {
        count_model.predict_expected_transactions(
            months * periods_per_month,
            record.frequency,
            record.recency,
            record.tenure,
        )
    };

    let mut cltv = 0.0;
    let mut previous = 0.0;
    let mut month = 0.0_f64;
    let mut discount = 1.0;
    while month < horizon_months {
        month += 1.0;
        discount *= 1.0 + discount_rate;
        let current = cumulative(month.min(horizon_months))?;
        cltv += expected_average_value * (current - previous).max(0.0) / discount;
        previous = current;
    }

    Ok(LifetimeValue {
        expected_transactions: previous,
        expected_average_value,
        cltv,
    })
}
