use std::path::PathBuf;

use anyhow::Context as _;

use crate::{schema::model_file::ModelFile, util::Output};

use super::PipelineArg;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct FitArg {
    #[clap(flatten)]
    pipeline: PipelineArg,
    /// Output file path of the fitted models (JSON)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &FitArg) -> anyhow::Result<()> {
    let FitArg { pipeline, output } = arg;
    let rows = pipeline.read_input()?;
    let pipeline = pipeline.pipeline()?;

    let prepared = pipeline.prepare(rows).context("Failed to prepare records")?;
    let models = pipeline.fit(&prepared).context("Failed to fit models")?;
    let model_file = ModelFile::new(
        models,
        pipeline.config().model,
        prepared.analysis_date,
        prepared.dataset.records.len(),
    );
    Output::save_json(&model_file, output.clone())
}
