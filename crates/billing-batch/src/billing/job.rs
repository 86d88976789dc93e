//! The `BillingJob`
//!
//! Three steps, run in order:
//!
//! 1. `filePreparation`: stage the input file into the staging directory
//! 2. `fileIngestion`: load the staged file into `billing_data`, skipping
//!    and logging unparseable lines up to the skip limit
//! 3. `reportGeneration`: price the period's rows and write those at or
//!    above the spending threshold to the report file

use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::info;

use super::parameters::{
    DATA_MONTH, DATA_YEAR, INPUT_FILE, OUTPUT_FILE, SKIP_FILE, SPENDING_THRESHOLD,
};
use super::pricing::FixedPricing;
use super::processor::BillingDataProcessor;
use super::reader::{BillingFileReader, BillingTableReader};
use super::record::{BillingData, ReportingData};
use super::staging::{staged_path, FilePreparationTasklet};
use super::validator::BillingParametersValidator;
use super::writer::{BillingReportWriter, BillingTableWriter};
use crate::config::{BatchConfig, PricingConfig};
use crate::engine::{
    ChunkConfig, ChunkStep, Job, RunParameters, SkipFileFaultHandler, Step, TaskletStep,
};
use crate::error::{BatchError, Result};

pub const JOB_NAME: &str = "BillingJob";
pub const FILE_PREPARATION_STEP: &str = "filePreparation";
pub const FILE_INGESTION_STEP: &str = "fileIngestion";
pub const REPORT_GENERATION_STEP: &str = "reportGeneration";

/// Everything one run of the job needs, resolved from parameters and
/// configuration before any step is built
#[derive(Debug, Clone, PartialEq)]
pub struct BillingJobConfig {
    pub input_file: PathBuf,
    pub staging_dir: PathBuf,
    pub staged_file: PathBuf,
    pub output_file: PathBuf,
    pub skip_file: PathBuf,
    pub data_year: i32,
    pub data_month: i32,
    pub spending_threshold: f64,
    pub pricing: PricingConfig,
    pub ingestion: ChunkConfig,
    pub reporting: ChunkConfig,
}

impl BillingJobConfig {
    /// Resolve a run's settings
    ///
    /// `parameters` must already have passed [`BillingParametersValidator`].
    /// A `spending.threshold` parameter takes precedence over the configured
    /// threshold.
    pub fn resolve(parameters: &RunParameters, config: &BatchConfig) -> Result<Self> {
        let input_file = PathBuf::from(parameters.require(INPUT_FILE)?);
        let output_file = PathBuf::from(parameters.require(OUTPUT_FILE)?);
        let data_year = parameters.require_i32(DATA_YEAR)?;
        let data_month = parameters.require_i32(DATA_MONTH)?;

        let staged_file = staged_path(&input_file, &config.staging_dir)?;

        let skip_file = match parameters.get(SKIP_FILE).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => config
                .staging_dir
                .join(format!("billing-data-skips-{data_year}-{data_month}.psv")),
        };

        let spending_threshold = match parameters.get(SPENDING_THRESHOLD) {
            Some(raw) => parse_threshold(raw)?,
            None => config.spending_threshold,
        };

        Ok(Self {
            input_file,
            staging_dir: config.staging_dir.clone(),
            staged_file,
            output_file,
            skip_file,
            data_year,
            data_month,
            spending_threshold,
            pricing: config.pricing,
            ingestion: ChunkConfig::new(config.chunk_size, config.skip_limit),
            reporting: ChunkConfig::new(config.chunk_size, 0),
        })
    }
}

fn parse_threshold(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(BatchError::config(format!(
            "{SPENDING_THRESHOLD}='{raw}' is not a number"
        ))),
    }
}

/// Build the steps of one run
pub fn billing_steps(pool: &SqlitePool, config: &BillingJobConfig) -> Result<Vec<Box<dyn Step>>> {
    let file_preparation = TaskletStep::new(
        FILE_PREPARATION_STEP,
        FilePreparationTasklet::new(&config.input_file, &config.staging_dir),
    );

    let file_ingestion = ChunkStep::<BillingData, BillingData>::builder(FILE_INGESTION_STEP)
        .reader(BillingFileReader::new(&config.staged_file))
        .pass_through()
        .writer(
            BillingTableWriter::new(pool.clone())
                .replacing_period(config.data_year, config.data_month),
        )
        .fault_handler(SkipFileFaultHandler::new(&config.skip_file))
        .config(config.ingestion)
        .build()?;

    let pricing = FixedPricing::new(config.pricing);
    let report_generation = ChunkStep::<BillingData, ReportingData>::builder(REPORT_GENERATION_STEP)
        .reader(
            BillingTableReader::new(pool.clone(), config.data_year, config.data_month)
                .with_page_size(config.reporting.chunk_size),
        )
        .processor(BillingDataProcessor::new(&pricing, config.spending_threshold))
        .writer(BillingReportWriter::new(&config.output_file))
        .config(config.reporting)
        .build()?;

    Ok(vec![
        Box::new(file_preparation),
        Box::new(file_ingestion),
        Box::new(report_generation),
    ])
}

/// The billing job, wired to `pool` and `config`
pub fn billing_job(pool: SqlitePool, config: BatchConfig) -> Result<Job> {
    config.validate()?;

    Job::builder(JOB_NAME)
        .validator(BillingParametersValidator)
        .steps(move |parameters| {
            let resolved = BillingJobConfig::resolve(parameters, &config)?;
            info!(
                input = %resolved.input_file.display(),
                output = %resolved.output_file.display(),
                year = resolved.data_year,
                month = resolved.data_month,
                threshold = resolved.spending_threshold,
                "Billing job configured"
            );
            billing_steps(&pool, &resolved)
        })
        .build()
}
