//! Parameter validation for the billing job

use super::parameters::{DATA_MONTH, DATA_YEAR, INPUT_FILE, OUTPUT_FILE};
use crate::engine::{ParametersValidator, RunParameters, ValidationError};

/// Rejects runs missing an input file, a billing period or an output file
///
/// Checks run in a fixed order (`input.file`, `data.year`, `data.month`,
/// `output.file`) and the first violation is reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct BillingParametersValidator;

impl ParametersValidator for BillingParametersValidator {
    fn validate(&self, parameters: &RunParameters) -> Result<(), ValidationError> {
        parameters.require(INPUT_FILE)?;
        parameters.require_i32(DATA_YEAR)?;
        parameters.require_i32(DATA_MONTH)?;
        parameters.require(OUTPUT_FILE)?;
        Ok(())
    }
}
