//! The monthly billing job
//!
//! Built from the generic engine: a staging tasklet, a file-to-table
//! ingestion step and a table-to-report step that prices each record.

pub mod job;
pub mod parameters;
pub mod pricing;
pub mod processor;
pub mod reader;
pub mod record;
pub mod staging;
pub mod validator;
pub mod writer;

// Re-export commonly used types
pub use job::{billing_job, billing_steps, BillingJobConfig, JOB_NAME};
pub use parameters::BillingParameters;
pub use pricing::{FixedPricing, PricingService};
pub use processor::BillingDataProcessor;
pub use reader::{BillingFileReader, BillingTableReader};
pub use record::{BillingData, ReportingData};
pub use staging::{stage, FilePreparationTasklet};
pub use validator::BillingParametersValidator;
pub use writer::{BillingReportWriter, BillingTableWriter};
