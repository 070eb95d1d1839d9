//! Beta-geometric / negative-binomial (BG/NBD) model of repeat purchases.
//!
//! While alive, a customer purchases according to a Poisson process with rate
//! `λ`; after every purchase the customer drops out for good with probability
//! `p`. Across the population `λ ~ Gamma(r, α)` and `p ~ Beta(a, b)`, so a
//! fitted model is the four hyperparameters `(r, α, a, b)`.
//!
//! # Fitting
//!
//! [`FittedCountModel::fit`] minimizes the mean negative log-likelihood of
//! the observed `(frequency, recency, tenure)` triples plus an L2 penalty
//! `penalty * (r² + α² + a² + b²)`. The search runs over log-parameters with
//! the Nelder-Mead simplex, starting from `(1, 1, 1, 1)`.
//!
//! Before optimizing, recency and tenure are rescaled so that the longest
//! tenure equals 10; the fitted `α` is mapped back to the caller's time unit.
//! Identical triples are collapsed into weighted observations.
//!
//! Every likelihood term is evaluated in log space. The two branches of a
//! repeat customer's likelihood (still alive at `T`, or dropped right after
//! the last purchase) are combined with [`log_add_exp`], and a customer with
//! no repeat purchases only contributes the first branch.
//!
//! # Predictions
//!
//! All predictions take the horizon and customer state in the same unit as
//! the records used for fitting.
//!
//! ```
//! use cltv_model::count_model::FittedCountModel;
//!
//! let model = FittedCountModel::new(0.243, 4.414, 0.793, 2.426).unwrap();
//! let near = model.predict_expected_transactions(10.0, 2, 30.0, 38.0).unwrap();
//! let far = model.predict_expected_transactions(40.0, 2, 30.0, 38.0).unwrap();
//! assert!(near < far);
//! assert_eq!(model.predict_expected_transactions(0.0, 2, 30.0, 38.0).unwrap(), 0.0);
//! ```

use std::collections::BTreeMap;

use cltv_stats::special::{ln_beta, ln_gamma, ln_hyp2f1, log_add_exp, log_sum_exp};
use serde::{Deserialize, Serialize};

use crate::{
    config::ModelConfig,
    error::{ComputationError, FitError, ModelKind, ParameterError, check_positive},
    record::{CustomerRecord, check_timing},
};

/// Longest tenure after rescaling the fit data.
const SCALED_MAX_TENURE: f64 = 10.0;

/// Fewer distinct observations than this cannot identify the hyperparameters.
const MIN_DISTINCT_OBSERVATIONS: usize = 2;

/// Half-width of the window around `a = 1` where closed forms are interpolated.
const UNIT_A_WINDOW: f64 = 1e-4;

/// Population hyperparameters of a fitted BG/NBD model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CountParams")]
pub struct FittedCountModel {
    r: f64,
    alpha: f64,
    a: f64,
    b: f64,
}

#[derive(Deserialize)]
struct CountParams {
    r: f64,
    alpha: f64,
    a: f64,
    b: f64,
}

impl TryFrom<CountParams> for FittedCountModel {
    type Error = ParameterError;

    fn try_from(params: CountParams) -> Result<Self, Self::Error> {
        Self::new(params.r, params.alpha, params.a, params.b)
    }
}

impl FittedCountModel {
    /// Creates a model from known hyperparameters.
    ///
    /// Every parameter must be positive and finite.
    pub fn new(r: f64, alpha: f64, a: f64, b: f64) -> Result<Self, ParameterError> {
        Ok(Self {
            r: check_positive("r", r)?,
            alpha: check_positive("alpha", alpha)?,
            a: check_positive("a", a)?,
            b: check_positive("b", b)?,
        })
    }

    /// Shape of the purchase-rate prior.
    #[must_use]
    pub fn r(&self) -> f64 {
        self.r
    }

    /// Scale of the purchase-rate prior, in the fit's time unit.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// First shape of the dropout-probability prior.
    #[must_use]
    pub fn a(&self) -> f64 {
        self.a
    }

    /// Second shape of the dropout-probability prior.
    #[must_use]
    pub fn b(&self) -> f64 {
        self.b
    }

    /// Fits the hyperparameters to a set of customer records.
    ///
    /// # Errors
    ///
    /// - [`FitError::EmptyInput`] if `records` is empty
    /// - [`FitError::InvalidRecord`] if a record has `tenure < recency` or a
    ///   negative or non-finite duration
    /// - [`FitError::InsufficientData`] if fewer than two distinct
    ///   `(frequency, recency, tenure)` triples exist
    /// - [`FitError::NotConverged`] if the optimizer exhausts its budget
    pub fn fit(records: &[CustomerRecord], config: &ModelConfig) -> Result<Self, FitError> {
        const MODEL: ModelKind = ModelKind::Count;

        if records.is_empty() {
            return Err(FitError::EmptyInput { model: MODEL });
        }
        for record in records {
            record
                .check_timing()
                .map_err(|reason| FitError::InvalidRecord {
                    model: MODEL,
                    customer_id: record.customer_id.clone(),
                    reason,
                })?;
        }

        let max_tenure = records.iter().map(|r| r.tenure).fold(0.0, f64::max);
        let scale = if max_tenure > 0.0 {
            SCALED_MAX_TENURE / max_tenure
        } else {
            1.0
        };
        let observations = collapse(records, scale);
        if observations.len() < MIN_DISTINCT_OBSERVATIONS {
            return Err(FitError::InsufficientData {
                model: MODEL,
                distinct: observations.len(),
                required: MIN_DISTINCT_OBSERVATIONS,
            });
        }

        let total_weight = observations.iter().map(|o| o.weight).sum::<f64>();
        let penalty = config.count_model_penalty;
        let objective = |log_params: &[f64]| {
            let params: [f64; 4] = std::array::from_fn(|i| log_params[i].exp());
            if params.iter().any(|p| !(p.is_finite() && *p > 0.0)) {
                return f64::INFINITY;
            }
            let terms = LikelihoodTerms::new(params);
            let log_likelihood = observations
                .iter()
                .map(|o| o.weight * terms.log_likelihood(o.frequency, o.recency, o.tenure))
                .sum::<f64>();
            let norm = params.iter().map(|p| p * p).sum::<f64>();
            penalty.mul_add(norm, -log_likelihood / total_weight)
        };

        let minimum = config
            .optimizer
            .nelder_mead()
            .minimize(objective, &[0.0; 4])
            .map_err(|err| FitError::from_optimizer(MODEL, err))?;
        tracing::debug!(
            iterations = minimum.iterations,
            evaluations = minimum.evaluations,
            objective = minimum.value,
            "count model optimizer converged"
        );

        let [r, alpha, a, b]: [f64; 4] = std::array::from_fn(|i| minimum.point[i].exp());
        let model = Self::new(r, alpha / scale, a, b)
            .map_err(|source| FitError::DegenerateSolution { model: MODEL, source })?;
        tracing::info!(
            r = model.r,
            alpha = model.alpha,
            a = model.a,
            b = model.b,
            customers = records.len(),
            "fitted count model"
        );
        Ok(model)
    }

    /// Log-likelihood of one customer's `(frequency, recency, tenure)`.
    #[must_use]
    pub fn log_likelihood(&self, frequency: u32, recency: f64, tenure: f64) -> f64 {
        LikelihoodTerms::new([self.r, self.alpha, self.a, self.b]).log_likelihood(
            f64::from(frequency),
            recency,
            tenure,
        )
    }

    /// Expected number of purchases in the next `horizon` time units,
    /// conditional on the customer's history.
    ///
    /// Returns 0 for a zero horizon and is non-decreasing in `horizon`.
    ///
    /// # Errors
    ///
    /// - [`ComputationError::InvalidHorizon`] if `horizon` is negative or not finite
    /// - [`ComputationError::InvalidCustomerState`] if `tenure < recency`
    /// - [`ComputationError::NumericalFailure`] if the hypergeometric series
    ///   cannot be evaluated
    pub fn predict_expected_transactions(
        &self,
        horizon: f64,
        frequency: u32,
        recency: f64,
        tenure: f64,
    ) -> Result<f64, ComputationError> {
        check_horizon(horizon)?;
        check_state(recency, tenure)?;
        if horizon == 0.0 {
            return Ok(0.0);
        }

        let Self { r, alpha, b, .. } = *self;
        let x = f64::from(frequency);
        let ln_odds_dead = if frequency > 0 {
            (self.a / (b + x - 1.0)).ln() + (r + x) * ((alpha + tenure) / (alpha + recency)).ln()
        } else {
            f64::NEG_INFINITY
        };

        self.around_unit_a(|a| {
            let z = horizon / (alpha + tenure + horizon);
            let ln_hyp = ln_hyp2f1(r + x, b + x, a + b + x - 1.0, z).ok_or(
                ComputationError::NumericalFailure {
                    quantity: "conditional expected transactions",
                },
            )?;
            let ln_decay = (r + x) * ((alpha + tenure) / (alpha + tenure + horizon)).ln();
            let numerator = (a + b + x - 1.0) / (a - 1.0) * -(ln_hyp + ln_decay).exp_m1();
            finite(
                numerator / (1.0 + ln_odds_dead.exp()),
                "conditional expected transactions",
            )
        })
        .map(|value| value.max(0.0))
    }

    /// Probability that the customer has not dropped out by the end of the
    /// observation window.
    ///
    /// A customer without repeat purchases is alive with certainty.
    ///
    /// # Errors
    ///
    /// [`ComputationError::InvalidCustomerState`] if `tenure < recency`.
    pub fn alive_probability(
        &self,
        frequency: u32,
        recency: f64,
        tenure: f64,
    ) -> Result<f64, ComputationError> {
        check_state(recency, tenure)?;
        if frequency == 0 {
            return Ok(1.0);
        }
        let x = f64::from(frequency);
        let ln_odds_dead = (self.a / (self.b + x - 1.0)).ln()
            + (self.r + x) * ((self.alpha + tenure) / (self.alpha + recency)).ln();
        Ok(1.0 / (1.0 + ln_odds_dead.exp()))
    }

    /// Expected number of purchases by a customer acquired now, over the
    /// next `horizon` time units.
    ///
    /// # Errors
    ///
    /// - [`ComputationError::InvalidHorizon`] if `horizon` is negative or not finite
    /// - [`ComputationError::NumericalFailure`] if the hypergeometric series
    ///   cannot be evaluated (for instance when `a + b < 1`)
    pub fn expected_purchases_for_new_customer(&self, horizon: f64) -> Result<f64, ComputationError> {
        check_horizon(horizon)?;
        if horizon == 0.0 {
            return Ok(0.0);
        }
        let Self { r, alpha, b, .. } = *self;
        self.around_unit_a(|a| {
            let ln_hyp = ln_hyp2f1(r, b, a + b - 1.0, horizon / (alpha + horizon)).ok_or(
                ComputationError::NumericalFailure {
                    quantity: "unconditional expected transactions",
                },
            )?;
            let ln_decay = r * (alpha / (alpha + horizon)).ln();
            finite(
                (a + b - 1.0) / (a - 1.0) * -(ln_hyp + ln_decay).exp_m1(),
                "unconditional expected transactions",
            )
        })
        .map(|value| value.max(0.0))
    }

    /// Probability that a customer acquired now makes exactly `count`
    /// purchases within `horizon` time units.
    ///
    /// # Errors
    ///
    /// - [`ComputationError::InvalidHorizon`] if `horizon` is negative or not finite
    /// - [`ComputationError::NumericalFailure`] if the result is not finite
    pub fn probability_of_purchases(&self, count: u32, horizon: f64) -> Result<f64, ComputationError> {
        check_horizon(horizon)?;
        if horizon == 0.0 {
            return Ok(if count == 0 { 1.0 } else { 0.0 });
        }

        let Self { r, alpha, a, b } = *self;
        let n = f64::from(count);
        let ln_beta_ab = ln_beta(a, b);
        let ln_rate_share = (alpha / (alpha + horizon)).ln();
        let ln_time_share = (horizon / (alpha + horizon)).ln();
        let ln_negative_binomial =
            |j: f64| ln_gamma(r + j) - ln_gamma(r) - ln_gamma(j + 1.0) + j * ln_time_share;

        let alive_throughout = (ln_beta(a, b + n) - ln_beta_ab
            + ln_negative_binomial(n)
            + r * ln_rate_share)
            .exp();
        let dropped_after_last = if count > 0 {
            let ln_partial = log_sum_exp((0..count).map(|j| ln_negative_binomial(f64::from(j))));
            let tail = -(r * ln_rate_share + ln_partial).exp_m1();
            (ln_beta(a + 1.0, b + n - 1.0) - ln_beta_ab).exp() * tail
        } else {
            0.0
        };

        finite(alive_throughout + dropped_after_last, "purchase count probability")
            .map(|p| p.clamp(0.0, 1.0))
    }

    /// Evaluates a closed form that has a removable singularity at `a = 1`.
    ///
    /// Inside a small window around 1 the value is interpolated linearly
    /// between the window edges.
    fn around_unit_a<F>(&self, eval: F) -> Result<f64, ComputationError>
    where
        F: Fn(f64) -> Result<f64, ComputationError>,
    {
        if (self.a - 1.0).abs() >= UNIT_A_WINDOW {
            return eval(self.a);
        }
        let lo = 1.0 - UNIT_A_WINDOW;
        let hi = 1.0 + UNIT_A_WINDOW;
        let (lo_value, hi_value) = (eval(lo)?, eval(hi)?);
        let t = (self.a - lo) / (hi - lo);
        Ok(t.mul_add(hi_value - lo_value, lo_value))
    }
}

/// Per-evaluation constants of the log-likelihood.
struct LikelihoodTerms {
    r: f64,
    alpha: f64,
    a: f64,
    b: f64,
    ln_gamma_r: f64,
    ln_gamma_b: f64,
    ln_gamma_ab: f64,
}

impl LikelihoodTerms {
    fn new([r, alpha, a, b]: [f64; 4]) -> Self {
        Self {
            r,
            alpha,
            a,
            b,
            ln_gamma_r: ln_gamma(r),
            ln_gamma_b: ln_gamma(b),
            ln_gamma_ab: ln_gamma(a + b),
        }
    }

    fn log_likelihood(&self, x: f64, recency: f64, tenure: f64) -> f64 {
        let Self { r, alpha, a, b, .. } = *self;
        let rate = ln_gamma(r + x) - self.ln_gamma_r + r * alpha.ln();
        let dropout = self.ln_gamma_ab + ln_gamma(b + x) - self.ln_gamma_b - ln_gamma(a + b + x);
        let alive_at_end = -(r + x) * (alpha + tenure).ln();
        if x > 0.0 {
            let dead_after_last = a.ln() - (b + x - 1.0).ln() - (r + x) * (alpha + recency).ln();
            rate + dropout + log_add_exp(alive_at_end, dead_after_last)
        } else {
            rate + dropout + alive_at_end
        }
    }
}

/// A distinct `(frequency, recency, tenure)` triple and its multiplicity.
struct Observation {
    frequency: f64,
    recency: f64,
    tenure: f64,
    weight: f64,
}

fn collapse(records: &[CustomerRecord], scale: f64) -> Vec<Observation> {
    let mut counts = BTreeMap::<(u32, u64, u64), f64>::new();
    for record in records {
        let key = (
            record.frequency,
            (record.recency * scale).to_bits(),
            (record.tenure * scale).to_bits(),
        );
        *counts.entry(key).or_default() += 1.0;
    }
    counts
        .into_iter()
        .map(|((frequency, recency, tenure), weight)| Observation {
            frequency: f64::from(frequency),
            recency: f64::from_bits(recency),
            tenure: f64::from_bits(tenure),
            weight,
        })
        .collect()
}

pub(crate) fn check_horizon(horizon: f64) -> Result<(), ComputationError> {
    if horizon.is_finite() && horizon >= 0.0 {
        Ok(())
    } else {
        Err(ComputationError::InvalidHorizon { horizon })
    }
}

fn check_state(recency: f64, tenure: f64) -> Result<(), ComputationError> {
    check_timing(recency, tenure).map_err(|reason| ComputationError::InvalidCustomerState { reason })
}

fn finite(value: f64, quantity: &'static str) -> Result<f64, ComputationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputationError::NumericalFailure { quantity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdnow() -> FittedCountModel {
        FittedCountModel::new(0.243, 4.414, 0.793, 2.426).unwrap()
    }

    fn record(id: &str, frequency: u32, recency: f64, tenure: f64) -> CustomerRecord {
        CustomerRecord {
            customer_id: id.to_owned(),
            frequency,
            recency,
            tenure,
            monetary_avg: 10.0,
        }
    }

    #[test]
    fn test_published_conditional_expectation() {
        // 2 repeat purchases, last at week 30.43, observed for 38.86 weeks;
        // the published 39-week forecast is 1.226.
        let expected = cdnow()
            .predict_expected_transactions(39.0, 2, 30.43, 38.86)
            .unwrap();
        assert!((expected - 1.226).abs() < 5e-3, "got {expected}");
    }

    #[test]
    fn test_zero_horizon() {
        let model = cdnow();
        assert_eq!(model.predict_expected_transactions(0.0, 0, 0.0, 5.0).unwrap(), 0.0);
        assert_eq!(model.expected_purchases_for_new_customer(0.0).unwrap(), 0.0);
        assert_eq!(model.probability_of_purchases(0, 0.0).unwrap(), 1.0);
        assert_eq!(model.probability_of_purchases(3, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_prediction_arguments() {
        let model = cdnow();
        assert!(matches!(
            model.predict_expected_transactions(-1.0, 2, 3.0, 5.0),
            Err(ComputationError::InvalidHorizon { .. })
        ));
        assert!(matches!(
            model.predict_expected_transactions(f64::NAN, 2, 3.0, 5.0),
            Err(ComputationError::InvalidHorizon { .. })
        ));
        assert!(matches!(
            model.predict_expected_transactions(4.0, 2, 6.0, 5.0),
            Err(ComputationError::InvalidCustomerState { .. })
        ));
        assert!(model.alive_probability(2, 6.0, 5.0).is_err());
    }

    #[test]
    fn test_alive_probability() {
        let model = cdnow();
        assert_eq!(model.alive_probability(0, 0.0, 30.0).unwrap(), 1.0);

        let recent = model.alive_probability(3, 29.0, 30.0).unwrap();
        let lapsed = model.alive_probability(3, 5.0, 30.0).unwrap();
        assert!((0.0..=1.0).contains(&recent));
        assert!((0.0..=1.0).contains(&lapsed));
        assert!(recent > lapsed);
    }

    #[test]
    fn test_lapsed_customers_buy_less() {
        let model = cdnow();
        let recent = model.predict_expected_transactions(20.0, 4, 29.0, 30.0).unwrap();
        let lapsed = model.predict_expected_transactions(20.0, 4, 5.0, 30.0).unwrap();
        assert!(recent > lapsed);
    }

    #[test]
    fn test_purchase_probabilities_sum_to_one() {
        let model = cdnow();
        let total = (0..200)
            .map(|n| model.probability_of_purchases(n, 52.0).unwrap())
            .sum::<f64>();
        assert!((total - 1.0).abs() < 1e-6, "got {total}");
    }

    #[test]
    fn test_purchase_probabilities_match_expectation() {
        let model = cdnow();
        let mean = (0..400)
            .map(|n| f64::from(n) * model.probability_of_purchases(n, 52.0).unwrap())
            .sum::<f64>();
        let expected = model.expected_purchases_for_new_customer(52.0).unwrap();
        assert!((mean - expected).abs() < 1e-4, "{mean} vs {expected}");
    }

    #[test]
    fn test_unit_a_is_continuous() {
        let at = |a: f64| {
            FittedCountModel::new(0.5, 3.0, a, 2.0)
                .unwrap()
                .predict_expected_transactions(10.0, 3, 8.0, 12.0)
                .unwrap()
        };
        let below = at(0.999);
        let exact = at(1.0);
        let above = at(1.001);
        assert!(exact.is_finite());
        assert!((below - exact).abs() < 1e-2);
        assert!((above - exact).abs() < 1e-2);
    }

    #[test]
    fn test_fit_rejects_invalid_input() {
        let config = ModelConfig::default();
        assert_eq!(
            FittedCountModel::fit(&[], &config),
            Err(FitError::EmptyInput {
                model: ModelKind::Count
            })
        );

        let records = [record("ok", 2, 3.0, 10.0), record("bad", 2, 12.0, 10.0)];
        match FittedCountModel::fit(&records, &config) {
            Err(FitError::InvalidRecord { customer_id, .. }) => assert_eq!(customer_id, "bad"),
            other => panic!("unexpected result: {other:?}"),
        }

        let records = [record("a", 2, 3.0, 10.0), record("b", 2, 3.0, 10.0)];
        assert!(matches!(
            FittedCountModel::fit(&records, &config),
            Err(FitError::InsufficientData { distinct: 1, .. })
        ));
    }

    #[test]
    fn test_fit_small_population() {
        let records = [
            record("a", 0, 0.0, 30.0),
            record("b", 1, 4.0, 30.0),
            record("c", 3, 20.0, 28.0),
            record("d", 6, 25.0, 26.0),
            record("e", 2, 10.0, 12.0),
            record("f", 0, 0.0, 18.0),
        ];
        let model = FittedCountModel::fit(&records, &ModelConfig::default()).unwrap();
        for value in [model.r(), model.alpha(), model.a(), model.b()] {
            assert!(value.is_finite() && value > 0.0);
        }
        let heavy = model.predict_expected_transactions(10.0, 6, 25.0, 26.0).unwrap();
        let light = model.predict_expected_transactions(10.0, 1, 4.0, 30.0).unwrap();
        assert!(heavy > light);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert_eq!(
            FittedCountModel::new(0.0, 1.0, 1.0, 1.0),
            Err(ParameterError {
                name: "r",
                value: 0.0,
                lower_bound: 0.0
            })
        );
        assert!(FittedCountModel::new(1.0, f64::NAN, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_serde_validates_parameters() {
        let model = cdnow();
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(serde_json::from_str::<FittedCountModel>(&json).unwrap(), model);

        let invalid = r#"{"r": -1.0, "alpha": 1.0, "a": 1.0, "b": 1.0}"#;
        assert!(serde_json::from_str::<FittedCountModel>(invalid).is_err());
    }
}
