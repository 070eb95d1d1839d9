//! Gamma-Gamma model of average purchase value.
//!
//! A customer's purchase values are `Gamma(p, ν)` with an individual rate
//! `ν`, and `ν ~ Gamma(q, v)` across the population. The model assumes that
//! purchase values are independent of purchase timing; the correlation
//! between frequency and average value is reported as a diagnostic, not
//! enforced.
//!
//! The fitted model shrinks each customer's observed average toward the
//! population mean `v·p / (q - 1)` with the weight `p·x / (p·x + q - 1)`,
//! where `x` is the customer's frequency.
//!
//! # Fitting
//!
//! [`FittedValueModel::fit`] minimizes the mean negative log-likelihood of the
//! `(frequency, monetary_avg)` pairs plus `penalty * (p² + q² + v²)`. The
//! search runs over `(ln p, ln(q - 1), ln v)`, which keeps the population
//! mean finite. Monetary values are divided by their mean while optimizing
//! and `v` is scaled back afterwards.
//!
//! ```
//! use cltv_model::value_model::FittedValueModel;
//!
//! let model = FittedValueModel::new(6.25, 3.74, 15.44).unwrap();
//! let population = model.population_mean();
//! let one = model.expected_average_value(1, 100.0).unwrap();
//! let many = model.expected_average_value(50, 100.0).unwrap();
//! assert!(population < one && one < many && many < 100.0);
//! ```

use std::collections::BTreeMap;

use cltv_stats::special::ln_gamma;
use serde::{Deserialize, Serialize};

use crate::{
    config::ModelConfig,
    error::{ComputationError, FitError, ModelKind, ParameterError, check_above, check_positive},
    record::CustomerRecord,
};

/// Fewer distinct observations than this cannot identify the hyperparameters.
const MIN_DISTINCT_OBSERVATIONS: usize = 2;

/// Population hyperparameters of a fitted Gamma-Gamma model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ValueParams")]
pub struct FittedValueModel {
    p: f64,
    q: f64,
    v: f64,
}

#[derive(Deserialize)]
struct ValueParams {
    p: f64,
    q: f64,
    v: f64,
}

impl TryFrom<ValueParams> for FittedValueModel {
    type Error = ParameterError;

    fn try_from(params: ValueParams) -> Result<Self, Self::Error> {
        Self::new(params.p, params.q, params.v)
    }
}

impl FittedValueModel {
    /// Creates a model from known hyperparameters.
    ///
    /// `p` and `v` must be positive and `q` greater than 1.
    pub fn new(p: f64, q: f64, v: f64) -> Result<Self, ParameterError> {
        Ok(Self {
            p: check_positive("p", p)?,
            q: check_above("q", q, 1.0)?,
            v: check_positive("v", v)?,
        })
    }

    /// Shape of the individual purchase-value distribution.
    #[must_use]
    pub fn p(&self) -> f64 {
        self.p
    }

    /// Shape of the population prior on the individual rate.
    #[must_use]
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Scale of the population prior, in the monetary unit.
    #[must_use]
    pub fn v(&self) -> f64 {
        self.v
    }

    /// Fits the hyperparameters to the `(frequency, monetary_avg)` pairs of
    /// `records`.
    ///
    /// # Errors
    ///
    /// - [`FitError::EmptyInput`] if `records` is empty
    /// - [`FitError::InvalidRecord`] if a record has zero frequency or a
    ///   non-positive monetary average
    /// - [`FitError::InsufficientData`] if fewer than two distinct pairs exist
    /// - [`FitError::NotConverged`] if the optimizer exhausts its budget
    pub fn fit(records: &[CustomerRecord], config: &ModelConfig) -> Result<Self, FitError> {
        const MODEL: ModelKind = ModelKind::Value;

        if records.is_empty() {
            return Err(FitError::EmptyInput { model: MODEL });
        }
        for record in records {
            record
                .check_monetary()
                .map_err(|reason| FitError::InvalidRecord {
                    model: MODEL,
                    customer_id: record.customer_id.clone(),
                    reason,
                })?;
        }

        #[expect(clippy::cast_precision_loss)]
        let scale = records.iter().map(|r| r.monetary_avg).sum::<f64>() / records.len() as f64;
        let observations = collapse(records, scale);
        if observations.len() < MIN_DISTINCT_OBSERVATIONS {
            return Err(FitError::InsufficientData {
                model: MODEL,
                distinct: observations.len(),
                required: MIN_DISTINCT_OBSERVATIONS,
            });
        }

        let total_weight = observations.iter().map(|o| o.weight).sum::<f64>();
        let penalty = config.value_model_penalty;
        let objective = |params: &[f64]| {
            let [p, q, v] = unconstrain(params);
            if ![p, q, v].iter().all(|x| x.is_finite() && *x > 0.0) || q <= 1.0 {
                return f64::INFINITY;
            }
            let ln_gamma_q = ln_gamma(q);
            let q_ln_v = q * v.ln();
            let log_likelihood = observations
                .iter()
                .map(|o| {
                    let px = p * o.frequency;
                    let ll = ln_gamma(px + q) - ln_gamma(px) - ln_gamma_q
                        + q_ln_v
                        + (px - 1.0) * o.monetary_avg.ln()
                        + px * o.frequency.ln()
                        - (px + q) * o.frequency.mul_add(o.monetary_avg, v).ln();
                    o.weight * ll
                })
                .sum::<f64>();
            let norm = p * p + q * q + v * v;
            penalty.mul_add(norm, -log_likelihood / total_weight)
        };

        let minimum = config
            .optimizer
            .nelder_mead()
            .minimize(objective, &[0.0; 3])
            .map_err(|err| FitError::from_optimizer(MODEL, err))?;
        tracing::debug!(
            iterations = minimum.iterations,
            evaluations = minimum.evaluations,
            objective = minimum.value,
            "value model optimizer converged"
        );

        let [p, q, v] = unconstrain(&minimum.point);
        let model = Self::new(p, q, v * scale)
            .map_err(|source| FitError::DegenerateSolution { model: MODEL, source })?;
        tracing::info!(
            p = model.p,
            q = model.q,
            v = model.v,
            population_mean = model.population_mean(),
            customers = records.len(),
            "fitted value model"
        );
        Ok(model)
    }

    /// Mean purchase value across the population.
    #[must_use]
    pub fn population_mean(&self) -> f64 {
        self.v * self.p / (self.q - 1.0)
    }

    /// Weight given to a customer's own average, in `[0, 1)`.
    ///
    /// Grows toward 1 as `frequency` grows.
    #[must_use]
    pub fn individual_weight(&self, frequency: u32) -> f64 {
        let px = self.p * f64::from(frequency);
        px / (px + self.q - 1.0)
    }

    /// Shrinkage estimate of the customer's expected average purchase value.
    ///
    /// Never negative.
    ///
    /// # Errors
    ///
    /// [`ComputationError::InvalidCustomerState`] if `monetary_avg` is negative
    /// or not finite.
    pub fn expected_average_value(
        &self,
        frequency: u32,
        monetary_avg: f64,
    ) -> Result<f64, ComputationError> {
        if !(monetary_avg.is_finite() && monetary_avg >= 0.0) {
            return Err(ComputationError::InvalidCustomerState {
                reason: format!(
                    "monetary average must be finite and non-negative, got {monetary_avg}"
                ),
            });
        }
        let weight = self.individual_weight(frequency);
        let estimate = (1.0 - weight).mul_add(self.population_mean(), weight * monetary_avg);
        Ok(estimate.max(0.0))
    }
}

/// Maps `(ln p, ln(q - 1), ln v)` to `(p, q, v)`.
fn unconstrain(params: &[f64]) -> [f64; 3] {
    [params[0].exp(), 1.0 + params[1].exp(), params[2].exp()]
}

/// A distinct `(frequency, monetary_avg)` pair and its multiplicity.
struct Observation {
    frequency: f64,
    monetary_avg: f64,
    weight: f64,
}

fn collapse(records: &[CustomerRecord], scale: f64) -> Vec<Observation> {
    let mut counts = BTreeMap::<(u32, u64), f64>::new();
    for record in records {
        let key = (record.frequency, (record.monetary_avg / scale).to_bits());
        *counts.entry(key).or_default() += 1.0;
    }
    counts
        .into_iter()
        .map(|((frequency, monetary_avg), weight)| Observation {
            frequency: f64::from(frequency),
            monetary_avg: f64::from_bits(monetary_avg),
            weight,
        })
        .collect()
}
