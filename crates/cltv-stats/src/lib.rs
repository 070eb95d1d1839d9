//! Numerical building blocks for customer lifetime value modeling.
//!
//! This crate has no dependencies and provides the pieces the probability
//! models are assembled from:
//!
//! - **Special functions**: log-gamma, log-beta, log-sum-exp and the Gauss
//!   hypergeometric function evaluated in log space
//! - **Optimization**: a derivative-free Nelder-Mead simplex minimizer
//! - **Descriptive statistics**: mean, median, variance, standard deviation and
//!   Pearson correlation
//! - **Quantiles**: linearly interpolated quantiles of a dataset
//!
//! # Modules
//!
//! - [`special`]: Special functions for log-likelihood evaluation
//! - [`optimize`]: Nelder-Mead minimization of a scalar objective
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`quantiles`]: Quantile computation and storage
//!
//! # Examples
//!
//! ## Evaluating special functions
//!
//! ```
//! use cltv_stats::special::{ln_gamma, log_add_exp};
//!
//! // Γ(5) = 4! = 24
//! assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-12);
//!
//! // ln(e^1 + e^1) = 1 + ln 2
//! assert!((log_add_exp(1.0, 1.0) - (1.0 + 2.0_f64.ln())).abs() < 1e-12);
//! ```
//!
//! ## Minimizing a function
//!
//! ```
//! use cltv_stats::optimize::NelderMead;
//!
//! let minimum = NelderMead::default()
//!     .minimize(|x| (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2), &[0.0, 0.0])
//!     .unwrap();
//! assert!((minimum.point[0] - 1.0).abs() < 1e-3);
//! assert!((minimum.point[1] + 2.0).abs() < 1e-3);
//! ```
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use cltv_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Computing quantiles
//!
//! ```
//! use cltv_stats::quantiles::Quantiles;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let quantiles = Quantiles::new(&values, &[0.25, 0.5, 0.75]);
//! assert_eq!(quantiles.get(0.5), Some(3.0));
//! ```

pub mod descriptive;
pub mod optimize;
pub mod quantiles;
pub mod special;
