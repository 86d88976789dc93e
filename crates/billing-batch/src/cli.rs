//! Command-line interface definitions
//!
//! Kept in the library so `xtask` can render the CLI reference from the same
//! clap definitions the binary parses.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::billing::BillingParameters;
use crate::engine::RunParameters;

/// Billing Batch - monthly billing ingestion and reporting
#[derive(Parser, Debug)]
#[command(name = "billing-batch")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the billing job for one billing period
    Run {
        /// Monthly billing file to ingest
        #[arg(short, long)]
        input_file: PathBuf,

        /// Where the report is written
        #[arg(short, long)]
        output_file: PathBuf,

        /// Year of the billing period
        #[arg(short, long)]
        year: i32,

        /// Month of the billing period
        #[arg(short, long)]
        month: i32,

        /// Where skipped input lines are logged
        /// (defaults to a file in the staging directory)
        #[arg(long)]
        skip_file: Option<PathBuf>,

        /// Spending threshold for the report
        /// (overrides BILLING_SPENDING_THRESHOLD)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Extra run parameter in the form key=value (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = RunParameters::parse_pair)]
        params: Vec<(String, String)>,
    },

    /// List recent job executions
    History {
        /// Number of executions to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

/// Run parameters for `billing-batch run`
///
/// `--param` entries are applied last and win over the named flags.
pub fn run_parameters(
    input_file: PathBuf,
    output_file: PathBuf,
    year: i32,
    month: i32,
    skip_file: Option<PathBuf>,
    threshold: Option<f64>,
    params: Vec<(String, String)>,
) -> RunParameters {
    let mut billing = BillingParameters::new(input_file, output_file, year, month);
    if let Some(skip_file) = skip_file {
        billing = billing.with_skip_file(skip_file);
    }
    if let Some(threshold) = threshold {
        billing = billing.with_spending_threshold(threshold);
    }

    let mut parameters = billing.into_run_parameters();
    for (key, value) in params {
        parameters.insert(key, value);
    }
    parameters
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::billing::parameters::{DATA_MONTH, INPUT_FILE, SKIP_FILE, SPENDING_THRESHOLD};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "billing-batch",
            "run",
            "--input-file",
            "input/billing-2023-01.csv",
            "--output-file",
            "staging/report.csv",
            "--year",
            "2023",
            "--month",
            "1",
            "--param",
            "skip.file=logs/skips.psv",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                year,
                month,
                threshold,
                params,
                ..
            } => {
                assert_eq!((year, month), (2023, 1));
                assert_eq!(threshold, None);
                assert_eq!(
                    params,
                    vec![("skip.file".to_string(), "logs/skips.psv".to_string())]
                );
            },
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_malformed_param() {
        let result = Cli::try_parse_from([
            "billing-batch",
            "run",
            "-i",
            "in.csv",
            "-o",
            "out.csv",
            "-y",
            "2023",
            "-m",
            "1",
            "-p",
            "no-separator",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_default_limit() {
        let cli = Cli::try_parse_from(["billing-batch", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 10 }));
    }

    #[test]
    fn test_run_parameters_extra_params_win() {
        let parameters = run_parameters(
            PathBuf::from("in.csv"),
            PathBuf::from("out.csv"),
            2023,
            1,
            Some(PathBuf::from("skips.psv")),
            Some(99.5),
            vec![(DATA_MONTH.to_string(), "2".to_string())],
        );

        assert_eq!(parameters.get(INPUT_FILE), Some("in.csv"));
        assert_eq!(parameters.get(SKIP_FILE), Some("skips.psv"));
        assert_eq!(parameters.get(SPENDING_THRESHOLD), Some("99.5"));
        assert_eq!(parameters.get(DATA_MONTH), Some("2"));
    }
}
