//! Billing Batch - main entry point

use anyhow::{Context, Result};
use billing_batch::billing::billing_job;
use billing_batch::cli::{run_parameters, Cli, Commands};
use billing_batch::config::BatchConfig;
use billing_batch::db::{connect, DbConfig};
use billing_batch::engine::{JobLauncher, JobResult, SqliteJobRepository};
use billing_common::logging::{init_logging, LogConfig, LogLevel};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("billing-batch")
        .build()
        .merge_env()?;

    // Dropping the guard flushes the file writer, so keep it alive
    let _guard = init_logging(&log_config)?;

    let pool = connect(&DbConfig::from_env())
        .await
        .context("Failed to open the billing database")?;
    let launcher = JobLauncher::new(Arc::new(SqliteJobRepository::new(pool.clone())));

    match cli.command {
        Commands::Run {
            input_file,
            output_file,
            year,
            month,
            skip_file,
            threshold,
            params,
        } => {
            let config = BatchConfig::from_env()?;
            let job = billing_job(pool, config)?;
            let parameters = run_parameters(
                input_file,
                output_file,
                year,
                month,
                skip_file,
                threshold,
                params,
            );

            let result = launcher.run(&job, parameters).await?;
            print_summary(&result);

            if result.is_success() {
                info!(job_id = %result.id, "Billing job completed");
                Ok(ExitCode::SUCCESS)
            } else {
                error!(job_id = %result.id, "Billing job failed");
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::History { limit } => {
            let results = launcher.repository().find_recent(limit).await?;
            if results.is_empty() {
                println!("No job executions recorded.");
            }
            for result in &results {
                print_summary(result);
            }
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn print_summary(result: &JobResult) {
    println!(
        "{} {} [{}] {} .. {}",
        result.job_name,
        result.id,
        result.status,
        result.started_at.format("%Y-%m-%d %H:%M:%S"),
        result.ended_at.format("%H:%M:%S"),
    );

    for step in &result.steps {
        println!(
            "  {:<18} {:<9} read={} written={} filtered={} skipped={}",
            step.step_name,
            step.status.as_str(),
            step.read_count,
            step.write_count,
            step.filter_count,
            step.skip_count,
        );
    }

    if let Some(failure) = &result.failure {
        println!("  failure: {failure}");
    }
    println!();
}
