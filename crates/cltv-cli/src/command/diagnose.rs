use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use cltv_analysis::diagnostics::FitDiagnostics;
use cltv_model::lifetime_value::FittedModels;
use serde::Serialize;

use crate::util::{self, Output};

use super::{
    PipelineArg,
    score::{CustomerIssue, dropped_rows},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct DiagnoseArg {
    #[clap(flatten)]
    pipeline: PipelineArg,
    /// Fitted models saved by `cltv fit`; the models are fitted if omitted
    #[arg(long)]
    models: Option<PathBuf>,
    /// Frequencies at or above this are pooled in the period-transactions table
    #[arg(long, default_value_t = 7)]
    max_frequency: u32,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct DiagnoseReport {
    analysis_date: NaiveDate,
    models: FittedModels,
    customers: usize,
    dropped: Vec<CustomerIssue>,
    diagnostics: FitDiagnostics,
}

pub(crate) fn run(arg: &DiagnoseArg) -> anyhow::Result<()> {
    let DiagnoseArg {
        pipeline,
        models,
        max_frequency,
        output,
    } = arg;
    let rows = pipeline.read_input()?;
    let pipeline = pipeline.pipeline()?;
    let prepared = pipeline.prepare(rows).context("Failed to prepare records")?;

    let models = match models {
        Some(path) => util::read_model_file(path)?.models(),
        None => pipeline.fit(&prepared).context("Failed to fit models")?,
    };
    let records = &prepared.dataset.records;
    let diagnostics = FitDiagnostics::compute(&models.count_model, records, *max_frequency)
        .context("Failed to compute diagnostics")?;

    let report = DiagnoseReport {
        analysis_date: prepared.analysis_date,
        models,
        customers: records.len(),
        dropped: dropped_rows(&prepared),
        diagnostics,
    };
    Output::save_json(&report, output.clone())
}
