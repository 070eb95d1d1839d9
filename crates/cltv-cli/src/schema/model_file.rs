use chrono::{DateTime, NaiveDate, Utc};
use cltv_model::{
    config::ModelConfig, count_model::FittedCountModel, lifetime_value::FittedModels,
    value_model::FittedValueModel,
};
use serde::{Deserialize, Serialize};

/// Fitted parameters saved by `cltv fit` and loaded by `predict` and
/// `diagnose`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelFile {
    pub fitted_at: DateTime<Utc>,
    pub analysis_date: NaiveDate,
    /// Number of customers the models were fitted on.
    pub customers: usize,
    pub config: ModelConfig,
    pub count_model: FittedCountModel,
    pub value_model: FittedValueModel,
}

impl ModelFile {
    pub fn new(
        models: FittedModels,
        config: ModelConfig,
        analysis_date: NaiveDate,
        customers: usize,
    ) -> Self {
        Self {
            fitted_at: Utc::now(),
            analysis_date,
            customers,
            config,
            count_model: models.count_model,
            value_model: models.value_model,
        }
    }

    pub fn models(&self) -> FittedModels {
        FittedModels {
            count_model: self.count_model,
            value_model: self.value_model,
        }
    }
}
