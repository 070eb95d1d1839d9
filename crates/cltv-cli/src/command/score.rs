use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use cltv_analysis::{
    outlier::ColumnCap,
    pipeline::{PipelineOutput, PreparedData},
    summary::{CustomerSummary, SegmentSummary, summarize_segments},
};
use cltv_model::lifetime_value::FittedModels;
use serde::Serialize;

use crate::util::Output;

use super::{OutputFormat, PipelineArg};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ScoreArg {
    #[clap(flatten)]
    pub(super) pipeline: PipelineArg,
    /// Output format of scored customers: csv or json
    #[arg(long, default_value = "csv")]
    pub(super) format: OutputFormat,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write a JSON report with fitted parameters and segment summaries to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

/// Issue raised for a single customer, kept as text in reports.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CustomerIssue {
    pub customer_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
struct ScoreReport {
    analysis_date: NaiveDate,
    models: FittedModels,
    retained: usize,
    excluded: usize,
    dropped: Vec<CustomerIssue>,
    unscored: Vec<CustomerIssue>,
    outlier_caps: Vec<ColumnCap>,
    overall: Option<CustomerSummary>,
    segments: Vec<SegmentSummary>,
}

impl ScoreReport {
    fn new(output: &PipelineOutput) -> Self {
        let PipelineOutput {
            prepared,
            models,
            scoring,
        } = output;
        Self {
            analysis_date: prepared.analysis_date,
            models: *models,
            retained: prepared.dataset.records.len(),
            excluded: prepared.dataset.excluded,
            dropped: dropped_rows(prepared),
            unscored: scoring
                .unscored
                .iter()
                .map(|c| CustomerIssue {
                    customer_id: c.customer_id.clone(),
                    message: c.error.to_string(),
                })
                .collect(),
            outlier_caps: prepared.outlier_caps.clone(),
            overall: CustomerSummary::new(&scoring.customers),
            segments: summarize_segments(&scoring.customers),
        }
    }
}

pub(crate) fn dropped_rows(prepared: &PreparedData) -> Vec<CustomerIssue> {
    prepared
        .dataset
        .dropped
        .iter()
        .map(|err| CustomerIssue {
            customer_id: err.customer_id().to_owned(),
            message: err.to_string(),
        })
        .collect()
}

pub(crate) fn run(arg: &ScoreArg) -> anyhow::Result<()> {
    let ScoreArg {
        pipeline,
        format,
        output,
        report,
    } = arg;
    let rows = pipeline.read_input()?;
    let pipeline = pipeline.pipeline()?;

    let result = pipeline.run(rows).context("Scoring failed")?;
    tracing::info!(
        analysis_date = %result.prepared.analysis_date,
        customers = result.scoring.customers.len(),
        "scoring finished"
    );

    super::write_scored(
        &result.scoring.customers,
        &pipeline.config().report_horizons_months,
        *format,
        output.clone(),
    )?;
    if let Some(path) = report {
        Output::save_json(&ScoreReport::new(&result), Some(path.clone()))?;
    }
    Ok(())
}
