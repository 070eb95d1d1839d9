//! End-to-end scoring run: aggregates in, scored and segmented customers out.
//!
//! The stages run strictly forward:
//!
//! 1. cap outliers of the channel columns (optional)
//! 2. build RFM records ([`RfmFeatureBuilder`])
//! 3. fit the count and value models in parallel ([`FittedModels::fit`])
//! 4. score every customer (chunks on scoped threads)
//! 5. segment the scored population
//!
//! Invalid rows are dropped and reported unless [`RowPolicy::Fail`] is set.
//! A customer whose score cannot be computed is reported in
//! [`PipelineOutput::unscored`] and left out of the segmentation. Fit and
//! segmentation failures end the run.

use std::{num::NonZero, panic, thread};

use chrono::NaiveDate;
use cltv_model::{
    config::{ConfigError, ModelConfig},
    error::{ComputationError, FitError},
    lifetime_value::{FittedModels, LifetimeValue},
    record::CustomerRecord,
    segment::{Segment, SegmentationError, assign_segments},
};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{CustomerAggregate, default_analysis_date},
    feature_builder::{DataError, RfmDataset, RfmFeatureBuilder},
    outlier::{ColumnCap, OutlierCapping, cap_outliers},
};

/// What to do with rows that cannot be converted into records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::Display,
    derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum RowPolicy {
    /// Drop the row and report it.
    #[default]
    #[display("drop")]
    Drop,
    /// Abort the run on the first invalid row.
    #[display("fail")]
    Fail,
}

/// Options of a scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    /// End of the observation window; defaults to two days after the latest
    /// order in the input.
    pub analysis_date: Option<NaiveDate>,
    pub cap_outliers: bool,
    pub outlier_capping: OutlierCapping,
    /// Horizons, in months, of the reported expected transaction counts.
    pub report_horizons_months: Vec<f64>,
    pub invalid_rows: RowPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            analysis_date: None,
            cap_outliers: true,
            outlier_capping: OutlierCapping::default(),
            report_horizons_months: vec![3.0, 6.0],
            invalid_rows: RowPolicy::Drop,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;
        for &value in &self.report_horizons_months {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::NegativeOrNonFinite {
                    name: "report_horizons_months",
                    value,
                });
            }
        }
        let capping = &self.outlier_capping;
        for (name, value) in [
            ("outlier_capping.lower_quantile", capping.lower_quantile),
            ("outlier_capping.upper_quantile", capping.upper_quantile),
            ("outlier_capping.spread_multiplier", capping.spread_multiplier),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::NegativeOrNonFinite { name, value });
            }
        }
        Ok(())
    }
}

/// Fatal errors of a scoring run.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum PipelineError {
    #[display("invalid configuration: {_0}")]
    Config(ConfigError),
    #[display("no analysis date given and no input rows to derive one from")]
    #[from(ignore)]
    NoAnalysisDate,
    #[display("invalid input row: {_0}")]
    Data(DataError),
    #[display("no valid customer has more than {min_frequency} orders")]
    #[from(ignore)]
    NoCustomers { min_frequency: u32 },
    #[display("model fit failed: {_0}")]
    Fit(FitError),
    #[display("segmentation failed: {_0}")]
    Segmentation(SegmentationError),
}

/// Expected transactions over one report horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonForecast {
    pub months: f64,
    pub transactions: f64,
}

/// One customer's features, model estimates and segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCustomer {
    pub customer_id: String,
    pub recency: f64,
    pub tenure: f64,
    pub frequency: u32,
    pub monetary_avg: f64,
    pub alive_probability: f64,
    pub expected_transactions: Vec<HorizonForecast>,
    pub expected_average_value: f64,
    pub cltv: f64,
    pub segment: Segment,
}

/// A customer whose score could not be computed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnscoredCustomer {
    pub customer_id: String,
    pub error: ComputationError,
}

/// Records ready for fitting or scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    pub analysis_date: NaiveDate,
    pub dataset: RfmDataset,
    pub outlier_caps: Vec<ColumnCap>,
}

/// Scored customers of a set of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Scoring {
    pub customers: Vec<ScoredCustomer>,
    pub unscored: Vec<UnscoredCustomer>,
}

/// Result of a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub prepared: PreparedData,
    pub models: FittedModels,
    pub scoring: Scoring,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Caps outliers and builds the RFM records.
    pub fn prepare(&self, mut rows: Vec<CustomerAggregate>) -> Result<PreparedData, PipelineError> {
        let analysis_date = self
            .config
            .analysis_date
            .or_else(|| default_analysis_date(&rows))
            .ok_or(PipelineError::NoAnalysisDate)?;

        let outlier_caps = if self.config.cap_outliers {
            cap_outliers(&mut rows, &self.config.outlier_capping)
        } else {
            Vec::new()
        };

        let model = &self.config.model;
        let builder = RfmFeatureBuilder::new(analysis_date, model.time_unit, model.min_frequency);
        let dataset = builder.build(&rows);
        if let (RowPolicy::Fail, Some(err)) = (self.config.invalid_rows, dataset.dropped.first()) {
            return Err(err.clone().into());
        }
        if dataset.records.is_empty() {
            return Err(PipelineError::NoCustomers {
                min_frequency: model.min_frequency,
            });
        }

        Ok(PreparedData {
            analysis_date,
            dataset,
            outlier_caps,
        })
    }

    /// Fits both models to prepared records.
    pub fn fit(&self, prepared: &PreparedData) -> Result<FittedModels, PipelineError> {
        Ok(FittedModels::fit(&prepared.dataset.records, &self.config.model)?)
    }

    /// Scores and segments `records` with already fitted models.
    pub fn score(
        &self,
        models: &FittedModels,
        records: &[CustomerRecord],
    ) -> Result<Scoring, PipelineError> {
        let results = score_in_parallel(records, |record| self.score_record(models, record));

        let mut scored = Vec::with_capacity(records.len());
        let mut unscored = Vec::new();
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(scores) => scored.push((record, scores)),
                Err(error) => {
                    tracing::warn!(customer_id = %record.customer_id, "cannot score customer: {error}");
                    unscored.push(UnscoredCustomer {
                        customer_id: record.customer_id.clone(),
                        error,
                    });
                }
            }
        }

        let cltvs = scored
            .iter()
            .map(|(_, scores)| scores.value.cltv)
            .collect::<Vec<_>>();
        let segments = assign_segments(&cltvs)?;
        let customers = scored
            .into_iter()
            .zip(segments)
            .map(|((record, scores), segment)| ScoredCustomer {
                customer_id: record.customer_id.clone(),
                recency: record.recency,
                tenure: record.tenure,
                frequency: record.frequency,
                monetary_avg: record.monetary_avg,
                alive_probability: scores.alive_probability,
                expected_transactions: scores.forecasts,
                expected_average_value: scores.value.expected_average_value,
                cltv: scores.value.cltv,
                segment,
            })
            .collect::<Vec<_>>();
        tracing::info!(
            scored = customers.len(),
            unscored = unscored.len(),
            "scored customers"
        );
        Ok(Scoring {
            customers,
            unscored,
        })
    }

    /// Prepares, fits, scores and segments in one go.
    pub fn run(&self, rows: Vec<CustomerAggregate>) -> Result<PipelineOutput, PipelineError> {
        let prepared = self.prepare(rows)?;
        let models = self.fit(&prepared)?;
        let scoring = self.score(&models, &prepared.dataset.records)?;
        Ok(PipelineOutput {
            prepared,
            models,
            scoring,
        })
    }

    fn score_record(
        &self,
        models: &FittedModels,
        record: &CustomerRecord,
    ) -> Result<RecordScores, ComputationError> {
        let model = &self.config.model;
        let periods_per_month = model.time_unit.periods_per_month();
        let forecasts = self
            .config
            .report_horizons_months
            .iter()
            .map(|&months| {
                let transactions = models.count_model.predict_expected_transactions(
                    months * periods_per_month,
                    record.frequency,
                    record.recency,
                    record.tenure,
                )?;
                Ok(HorizonForecast {
                    months,
                    transactions,
                })
            })
            .collect::<Result<Vec<_>, ComputationError>>()?;
        Ok(RecordScores {
            alive_probability: models.count_model.alive_probability(
                record.frequency,
                record.recency,
                record.tenure,
            )?,
            forecasts,
            value: models.score(record, model)?,
        })
    }
}

struct RecordScores {
    alive_probability: f64,
    forecasts: Vec<HorizonForecast>,
    value: LifetimeValue,
}

/// Applies `score` to every record on scoped threads, keeping input order.
fn score_in_parallel<T, F>(records: &[CustomerRecord], score: F) -> Vec<T>
where
    T: Send,
    F: Fn(&CustomerRecord) -> T + Sync,
{
    let threads = thread::available_parallelism().map_or(1, NonZero::get);
    let chunk_size = records.len().div_ceil(threads).max(1);
    let score = &score;
    thread::scope(|s| {
        let handles = records
            .chunks(chunk_size)
            .map(|chunk| s.spawn(move || chunk.iter().map(score).collect::<Vec<_>>()))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload))
            })
            .collect()
    })
}
