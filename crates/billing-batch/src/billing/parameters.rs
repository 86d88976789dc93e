//! Run parameters understood by the billing job

use std::path::PathBuf;

use crate::engine::RunParameters;

/// Path of the monthly billing file to ingest (required)
pub const INPUT_FILE: &str = "input.file";

/// Path the report is written to (required)
pub const OUTPUT_FILE: &str = "output.file";

/// Year of the billing period (required, integer)
pub const DATA_YEAR: &str = "data.year";

/// Month of the billing period (required, integer)
pub const DATA_MONTH: &str = "data.month";

/// Where skipped input lines are logged (optional)
pub const SKIP_FILE: &str = "skip.file";

/// Overrides the configured spending threshold (optional, number)
pub const SPENDING_THRESHOLD: &str = "spending.threshold";

/// Typed constructor for billing job parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BillingParameters {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub data_year: i32,
    pub data_month: i32,
    pub skip_file: Option<PathBuf>,
    pub spending_threshold: Option<f64>,
}

impl BillingParameters {
    pub fn new(
        input_file: impl Into<PathBuf>,
        output_file: impl Into<PathBuf>,
        data_year: i32,
        data_month: i32,
    ) -> Self {
        Self {
            input_file: input_file.into(),
            output_file: output_file.into(),
            data_year,
            data_month,
            skip_file: None,
            spending_threshold: None,
        }
    }

    pub fn with_skip_file(mut self, skip_file: impl Into<PathBuf>) -> Self {
        self.skip_file = Some(skip_file.into());
        self
    }

    pub fn with_spending_threshold(mut self, threshold: f64) -> Self {
        self.spending_threshold = Some(threshold);
        self
    }

    pub fn into_run_parameters(self) -> RunParameters {
        let mut params = RunParameters::new()
            .with(INPUT_FILE, self.input_file.to_string_lossy())
            .with(OUTPUT_FILE, self.output_file.to_string_lossy())
            .with(DATA_YEAR, self.data_year.to_string())
            .with(DATA_MONTH, self.data_month.to_string());

        if let Some(skip_file) = self.skip_file {
            params.insert(SKIP_FILE, skip_file.to_string_lossy());
        }
        if let Some(threshold) = self.spending_threshold {
            params.insert(SPENDING_THRESHOLD, threshold.to_string());
        }

        params
    }
}

impl From<BillingParameters> for RunParameters {
    fn from(params: BillingParameters) -> Self {
        params.into_run_parameters()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_into_run_parameters() {
        let params = BillingParameters::new("input/billing-2023-01.csv", "out/report.csv", 2023, 1)
            .with_spending_threshold(99.5)
            .into_run_parameters();

        assert_eq!(params.get(INPUT_FILE), Some("input/billing-2023-01.csv"));
        assert_eq!(params.get(OUTPUT_FILE), Some("out/report.csv"));
        assert_eq!(params.get(DATA_YEAR), Some("2023"));
        assert_eq!(params.get(DATA_MONTH), Some("1"));
        assert_eq!(params.get(SPENDING_THRESHOLD), Some("99.5"));
        assert_eq!(params.get(SKIP_FILE), None);
    }
}
