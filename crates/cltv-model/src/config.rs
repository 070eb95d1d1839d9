//! Explicit configuration passed into every fit and prediction call.

use cltv_stats::optimize::NelderMead;
use serde::{Deserialize, Serialize};

/// Average number of days in a calendar month.
const DAYS_PER_MONTH: f64 = 30.0;

/// Unit in which recency, tenure and prediction horizons are expressed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display,
    derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[display("hour")]
    Hour,
    #[display("day")]
    Day,
    #[default]
    #[display("week")]
    Week,
    #[display("month")]
    Month,
}

impl TimeUnit {
    /// Length of one unit in days.
    #[must_use]
    pub fn days(self) -> f64 {
        match self {
            Self::Hour => 1.0 / 24.0,
            Self::Day => 1.0,
            Self::Week => 7.0,
            Self::Month => DAYS_PER_MONTH,
        }
    }

    /// Number of units in one month.
    ///
    /// Weeks use the calendar average of 4.345 weeks per month rather than
    /// `30 / 7`.
    #[must_use]
    pub fn periods_per_month(self) -> f64 {
        match self {
            Self::Hour => DAYS_PER_MONTH * 24.0,
            Self::Day => DAYS_PER_MONTH,
            Self::Week => 4.345,
            Self::Month => 1.0,
        }
    }
}

/// Settings for the likelihood optimizer shared by both model fits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Iteration budget; a fit that exhausts it fails.
    pub max_iterations: usize,
    /// Convergence threshold on both parameter and objective spread.
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-8,
        }
    }
}

impl OptimizerConfig {
    pub(crate) fn nelder_mead(&self) -> NelderMead {
        NelderMead {
            max_iterations: self.max_iterations,
            x_tolerance: self.tolerance,
            f_tolerance: self.tolerance,
            ..NelderMead::default()
        }
    }
}

/// Model options recognized by fitting, scoring and segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// L2 regularization strength for the count-model fit.
    pub count_model_penalty: f64,
    /// L2 regularization strength for the value-model fit.
    pub value_model_penalty: f64,
    /// Forecast window for the lifetime value, in months.
    pub horizon_months: f64,
    /// Unit of recency, tenure and count-model horizons.
    pub time_unit: TimeUnit,
    /// Monthly discount rate.
    pub discount_rate: f64,
    /// Customers are modeled only when `frequency > min_frequency`.
    pub min_frequency: u32,
    pub optimizer: OptimizerConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            count_model_penalty: 0.001,
            value_model_penalty: 0.01,
            horizon_months: 6.0,
            time_unit: TimeUnit::Week,
            discount_rate: 0.01,
            min_frequency: 1,
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("{name} must be a finite non-negative number, got {value}")]
    NegativeOrNonFinite { name: &'static str, value: f64 },
    #[display("optimizer tolerance must be a positive finite number, got {value}")]
    InvalidTolerance { value: f64 },
    #[display("optimizer iteration budget must be positive")]
    ZeroIterations,
}

impl ModelConfig {
    /// Checks every option against its admissible range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("count_model_penalty", self.count_model_penalty),
            ("value_model_penalty", self.value_model_penalty),
            ("horizon_months", self.horizon_months),
            ("discount_rate", self.discount_rate),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::NegativeOrNonFinite { name, value });
            }
        }
        let tolerance = self.optimizer.tolerance;
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(ConfigError::InvalidTolerance { value: tolerance });
        }
        if self.optimizer.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }
}
