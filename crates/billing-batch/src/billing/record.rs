//! Billing records

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One account's usage for one month, as found in the input file
///
/// Input lines hold the fields in declaration order, comma separated:
///
/// ```text
/// 2023,1,100,+1-202-555-0171,443.32,92,51
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingData {
    pub data_year: i32,
    pub data_month: i32,
    pub account_id: i64,
    pub phone_number: String,
    pub data_usage: f64,
    pub call_duration: i32,
    pub sms_count: i32,
}

impl BillingData {
    /// Number of fields in an input line
    pub const FIELD_COUNT: usize = 7;

    /// Parse a single comma-separated input line
    pub fn parse_line(line: &str) -> Result<Self, RecordParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(line.as_bytes());

        let record = reader
            .records()
            .next()
            .ok_or(RecordParseError::Empty)??;

        if record.len() != Self::FIELD_COUNT {
            return Err(RecordParseError::FieldCount {
                expected: Self::FIELD_COUNT,
                found: record.len(),
            });
        }

        Ok(record.deserialize(None)?)
    }
}

/// Why an input line could not become a [`BillingData`]
#[derive(Error, Debug)]
pub enum RecordParseError {
    #[error("empty record")]
    Empty,

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("{0}")]
    Csv(#[from] csv::Error),
}

/// A billing record together with its computed total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportingData {
    pub billing_data: BillingData,
    pub billing_total: f64,
}
