//! Customer lifetime value analysis of per-channel order aggregates.
//!
//! The crate turns raw [`aggregate::CustomerAggregate`] rows into RFM records,
//! fits the models of `cltv_model` to them and reports scored, segmented
//! customers together with fit diagnostics.
//!
//! Most callers only need [`pipeline::Pipeline`]; the stages it chains are
//! public for callers that fit and score separately.

pub mod aggregate;
pub mod diagnostics;
pub mod feature_builder;
pub mod outlier;
pub mod pipeline;
pub mod summary;

#[cfg(test)]
mod testing;
