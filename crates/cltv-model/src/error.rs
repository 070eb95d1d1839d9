//! Error kinds raised while fitting and evaluating the models.
//!
//! Fit failures are fatal to a scoring run: there is no meaningful partial
//! result from a model that did not converge. Computation failures are fatal
//! to a single prediction call only.

use cltv_stats::optimize::OptimizeError;

/// Which of the two probability models an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ModelKind {
    #[display("count model")]
    Count,
    #[display("value model")]
    Value,
}

/// Errors raised while fitting a count or value model.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum FitError {
    #[display("{model}: no customer records to fit")]
    EmptyInput { model: ModelKind },
    #[display("{model}: record for customer '{customer_id}' is invalid: {reason}")]
    InvalidRecord {
        model: ModelKind,
        customer_id: String,
        reason: String,
    },
    #[display(
        "{model}: {distinct} distinct observation(s) cannot identify the parameters (need at least {required})"
    )]
    InsufficientData {
        model: ModelKind,
        distinct: usize,
        required: usize,
    },
    #[display("{model}: log-likelihood is not finite at the starting parameters")]
    NonFiniteLikelihood { model: ModelKind },
    #[display("{model}: optimizer did not converge within {iterations} iterations")]
    NotConverged { model: ModelKind, iterations: usize },
    #[display("{model}: optimizer ended on an invalid parameter vector: {source}")]
    DegenerateSolution {
        model: ModelKind,
        source: ParameterError,
    },
}

impl FitError {
    pub(crate) fn from_optimizer(model: ModelKind, err: OptimizeError) -> Self {
        match err {
            OptimizeError::EmptyStart | OptimizeError::NonFiniteStart => {
                Self::NonFiniteLikelihood { model }
            }
            OptimizeError::NotConverged { iterations, .. } => {
                Self::NotConverged { model, iterations }
            }
        }
    }
}

/// A model parameter outside its admissible range.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("parameter {name} must be finite and greater than {lower_bound}, got {value}")]
pub struct ParameterError {
    pub name: &'static str,
    pub value: f64,
    pub lower_bound: f64,
}

pub(crate) fn check_above(
    name: &'static str,
    value: f64,
    lower_bound: f64,
) -> Result<f64, ParameterError> {
    if value.is_finite() && value > lower_bound {
        Ok(value)
    } else {
        Err(ParameterError {
            name,
            value,
            lower_bound,
        })
    }
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<f64, ParameterError> {
    check_above(name, value, 0.0)
}

/// Errors raised by prediction calls on fitted models.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ComputationError {
    #[display("horizon must be a finite non-negative number, got {horizon}")]
    InvalidHorizon { horizon: f64 },
    #[display("discount rate must be a finite non-negative number, got {rate}")]
    InvalidDiscountRate { rate: f64 },
    #[display("invalid customer state: {reason}")]
    InvalidCustomerState { reason: String },
    #[display("numerical failure while evaluating {quantity}")]
    NumericalFailure { quantity: &'static str },
}
