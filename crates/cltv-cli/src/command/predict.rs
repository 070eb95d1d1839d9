use std::path::PathBuf;

use anyhow::Context as _;

use crate::util;

use super::{OutputFormat, PipelineArg};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct PredictArg {
    #[clap(flatten)]
    pipeline: PipelineArg,
    /// Fitted models saved by `cltv fit`
    #[arg(long)]
    models: PathBuf,
    /// Output format of scored customers: csv or json
    #[arg(long, default_value = "csv")]
    format: OutputFormat,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &PredictArg) -> anyhow::Result<()> {
    let PredictArg {
        pipeline,
        models,
        format,
        output,
    } = arg;
    let model_file = util::read_model_file(models)?;
    let rows = pipeline.read_input()?;
    let pipeline = pipeline.pipeline()?;

    let time_unit = pipeline.config().model.time_unit;
    anyhow::ensure!(
        model_file.config.time_unit == time_unit,
        "Models in {} were fitted with time unit '{}', but scoring uses '{}'",
        models.display(),
        model_file.config.time_unit,
        time_unit,
    );

    let prepared = pipeline.prepare(rows).context("Failed to prepare records")?;
    let scoring = pipeline
        .score(&model_file.models(), &prepared.dataset.records)
        .context("Scoring failed")?;
    super::write_scored(
        &scoring.customers,
        &pipeline.config().report_horizons_months,
        *format,
        output.clone(),
    )
}
