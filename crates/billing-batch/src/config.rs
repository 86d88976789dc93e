//! Runtime configuration
//!
//! Settings that stay fixed across runs (staging directory, chunk policy,
//! pricing) come from `BILLING_*` environment variables. Values that
//! change per run are job parameters, see [`crate::billing::job`]. Database
//! settings live in [`crate::db::DbConfig`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{BatchError, Result};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default directory the input file is staged into.
pub const DEFAULT_STAGING_DIR: &str = "staging";

/// Default number of items committed together.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default number of parse faults tolerated by the ingestion step.
pub const DEFAULT_SKIP_LIMIT: u64 = 10;

/// Default spending threshold below which a record is left out of the report.
pub const DEFAULT_SPENDING_THRESHOLD: f64 = 150.0;

/// Default price per unit of data usage.
pub const DEFAULT_DATA_PRICE: f64 = 0.01;

/// Default price per unit of call duration.
pub const DEFAULT_CALL_PRICE: f64 = 0.5;

/// Default price per SMS.
pub const DEFAULT_SMS_PRICE: f64 = 0.1;

/// Batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub staging_dir: PathBuf,
    pub chunk_size: usize,
    pub skip_limit: u64,
    pub spending_threshold: f64,
    pub pricing: PricingConfig,
}

/// Rates applied by the report step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub data_price: f64,
    pub call_price: f64,
    pub sms_price: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            data_price: DEFAULT_DATA_PRICE,
            call_price: DEFAULT_CALL_PRICE,
            sms_price: DEFAULT_SMS_PRICE,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_limit: DEFAULT_SKIP_LIMIT,
            spending_threshold: DEFAULT_SPENDING_THRESHOLD,
            pricing: PricingConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BILLING_STAGING_DIR`
    /// - `BILLING_CHUNK_SIZE`
    /// - `BILLING_SKIP_LIMIT`
    /// - `BILLING_SPENDING_THRESHOLD`
    /// - `BILLING_DATA_PRICE`, `BILLING_CALL_PRICE`, `BILLING_SMS_PRICE`
    ///
    /// Unset variables fall back to the defaults; a variable that is set but
    /// does not parse is an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            staging_dir: std::env::var("BILLING_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            chunk_size: env_or("BILLING_CHUNK_SIZE", defaults.chunk_size)?,
            skip_limit: env_or("BILLING_SKIP_LIMIT", defaults.skip_limit)?,
            spending_threshold: env_or(
                "BILLING_SPENDING_THRESHOLD",
                defaults.spending_threshold,
            )?,
            pricing: PricingConfig {
                data_price: env_or("BILLING_DATA_PRICE", defaults.pricing.data_price)?,
                call_price: env_or("BILLING_CALL_PRICE", defaults.pricing.call_price)?,
                sms_price: env_or("BILLING_SMS_PRICE", defaults.pricing.sms_price)?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BatchError::config("Chunk size must be greater than 0"));
        }

        let rates = [
            self.pricing.data_price,
            self.pricing.call_price,
            self.pricing.sms_price,
        ];
        if rates.iter().any(|rate| !rate.is_finite() || *rate < 0.0) {
            return Err(BatchError::config("Pricing rates must be finite and non-negative"));
        }

        if !self.spending_threshold.is_finite() {
            return Err(BatchError::config("Spending threshold must be a finite number"));
        }

        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| BatchError::config(format!("{key}='{raw}' is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}
