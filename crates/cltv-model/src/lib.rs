//! Probabilistic customer lifetime value models.
//!
//! This crate scores customers from an RFM summary of their history
//! ([`record::CustomerRecord`]) with two independently fitted models:
//!
//! - [`count_model`] - BG/NBD model of repeat purchases: expected purchases in
//!   a future window and the probability that a customer is still active
//! - [`value_model`] - Gamma-Gamma model of purchase value: a shrinkage
//!   estimate of each customer's average purchase value
//!
//! [`lifetime_value`] combines both into a discounted value over a horizon
//! and [`segment`] cuts the scored population into quartile tiers.
//!
//! Fitted models are immutable parameter tuples. Every fit and prediction
//! takes its options from an explicit [`config::ModelConfig`], so fitted models
//! can be shared across threads and runs are reproducible.
//!
//! # Example
//!
//! ```
//! use cltv_model::{
//!     config::ModelConfig,
//!     lifetime_value::FittedModels,
//!     record::CustomerRecord,
//!     segment::assign_segments,
//! };
//!
//! let records = [(2, 4.0, 30.0, 30.0), (3, 20.0, 28.0, 55.0), (6, 25.0, 26.0, 40.0),
//!                (2, 10.0, 12.0, 20.0), (4, 15.0, 18.0, 35.0)]
//!     .into_iter()
//!     .enumerate()
//!     .map(|(i, (frequency, recency, tenure, monetary_avg))| CustomerRecord {
//!         customer_id: format!("customer-{i}"),
//!         frequency,
//!         recency,
//!         tenure,
//!         monetary_avg,
//!     })
//!     .collect::<Vec<_>>();
//!
//! let config = ModelConfig::default();
//! let models = FittedModels::fit(&records, &config)?;
//! let scores = records
//!     .iter()
//!     .map(|record| models.score(record, &config).map(|value| value.cltv))
//!     .collect::<Result<Vec<_>, _>>()?;
//! let segments = assign_segments(&scores)?;
//! assert_eq!(segments.len(), records.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod count_model;
pub mod error;
pub mod lifetime_value;
pub mod record;
pub mod segment;
pub mod simulate;
pub mod value_model;
