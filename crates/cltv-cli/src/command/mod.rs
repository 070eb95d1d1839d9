use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cltv_analysis::{
    aggregate::CustomerAggregate,
    pipeline::{Pipeline, PipelineConfig, RowPolicy, ScoredCustomer},
};
use cltv_model::config::TimeUnit;

use crate::{schema::scored_customer, util::{self, Output}};

use self::{
    diagnose::DiagnoseArg, fit::FitArg, generate::GenerateArg, predict::PredictArg,
    score::ScoreArg,
};

mod diagnose;
mod fit;
mod generate;
mod predict;
mod score;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log filter, e.g. `debug` or `cltv_model=debug` (defaults to `RUST_LOG`, then `info`)
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Fit both models and score every customer
    Score(#[clap(flatten)] ScoreArg),
    /// Fit both models and save their parameters
    Fit(#[clap(flatten)] FitArg),
    /// Score customers with previously saved models
    Predict(#[clap(flatten)] PredictArg),
    /// Report fit diagnostics of the count and value models
    Diagnose(#[clap(flatten)] DiagnoseArg),
    /// Generate a synthetic customer population
    Generate(#[clap(flatten)] GenerateArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    util::init_logging(args.log_level.as_deref())?;
    match args.mode {
        Mode::Score(arg) => score::run(&arg)?,
        Mode::Fit(arg) => fit::run(&arg)?,
        Mode::Predict(arg) => predict::run(&arg)?,
        Mode::Diagnose(arg) => diagnose::run(&arg)?,
        Mode::Generate(arg) => generate::run(&arg)?,
    }
    Ok(())
}

/// Output format of scored customers.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub(crate) enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Input and configuration options shared by every command reading aggregates.
#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct PipelineArg {
    /// Customer aggregates CSV file
    input: PathBuf,
    /// TOML configuration file; command-line options override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// End of the observation window (YYYY-MM-DD); defaults to two days after the latest order
    #[arg(long)]
    analysis_date: Option<NaiveDate>,
    /// Unit of recency and tenure: hour, day, week or month
    #[arg(long)]
    time_unit: Option<TimeUnit>,
    /// Lifetime value horizon in months
    #[arg(long)]
    horizon_months: Option<f64>,
    /// Monthly discount rate
    #[arg(long)]
    discount_rate: Option<f64>,
    /// Only customers with more orders than this are modeled
    #[arg(long)]
    min_frequency: Option<u32>,
    /// Keep extreme channel values instead of capping them
    #[arg(long)]
    no_outlier_capping: bool,
    /// Abort on the first invalid input row instead of dropping it
    #[arg(long)]
    strict: bool,
}

impl PipelineArg {
    pub(crate) fn config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => util::read_config_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(date) = self.analysis_date {
            config.analysis_date = Some(date);
        }
        if let Some(time_unit) = self.time_unit {
            config.model.time_unit = time_unit;
        }
        if let Some(horizon_months) = self.horizon_months {
            config.model.horizon_months = horizon_months;
        }
        if let Some(discount_rate) = self.discount_rate {
            config.model.discount_rate = discount_rate;
        }
        if let Some(min_frequency) = self.min_frequency {
            config.model.min_frequency = min_frequency;
        }
        if self.no_outlier_capping {
            config.cap_outliers = false;
        }
        if self.strict {
            config.invalid_rows = RowPolicy::Fail;
        }
        Ok(config)
    }

    pub(crate) fn pipeline(&self) -> anyhow::Result<Pipeline> {
        Pipeline::new(self.config()?).context("Invalid configuration")
    }

    pub(crate) fn read_input(&self) -> anyhow::Result<Vec<CustomerAggregate>> {
        util::read_aggregates_file(&self.input)
    }
}

/// Writes scored customers to `output` (stdout if `None`).
pub(crate) fn write_scored(
    customers: &[ScoredCustomer],
    horizons_months: &[f64],
    format: OutputFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut output = Output::from_output_path(output)?;
    match format {
        OutputFormat::Csv => scored_customer::write_csv(&mut output, customers, horizons_months)
            .with_context(|| format!("Failed to write scores to {}", output.display_path())),
        OutputFormat::Json => output.write_json(customers),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn test_parse_score_command() {
        let args = CommandArgs::try_parse_from([
            "cltv",
            "--log-level",
            "debug",
            "score",
            "customers.csv",
            "--time-unit",
            "day",
            "--analysis-date",
            "2021-06-01",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        let Mode::Score(arg) = args.mode else {
            panic!("expected score command");
        };
        let config = arg.pipeline.config().unwrap();
        assert_eq!(config.model.time_unit, TimeUnit::Day);
        assert_eq!(config.analysis_date, NaiveDate::from_ymd_opt(2021, 6, 1));
        assert_eq!(arg.format, OutputFormat::Json);
    }

    #[test]
    fn test_command_line_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "cap_outliers = true\n[model]\nhorizon_months = 12.0\nmin_frequency = 3\n").unwrap();
        let arg = PipelineArg {
            input: PathBuf::from("customers.csv"),
            config: Some(file.path().to_owned()),
            min_frequency: Some(2),
            no_outlier_capping: true,
            strict: true,
            ..PipelineArg::default()
        };
        let config = arg.config().unwrap();
        assert_eq!(config.model.horizon_months, 12.0);
        assert_eq!(config.model.min_frequency, 2);
        assert!(!config.cap_outliers);
        assert_eq!(config.invalid_rows, RowPolicy::Fail);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let arg = PipelineArg {
            discount_rate: Some(-0.5),
            ..PipelineArg::default()
        };
        assert!(arg.pipeline().is_err());
    }
}
