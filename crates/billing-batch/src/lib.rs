//! Billing Batch
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! A chunk-oriented batch engine and the monthly billing job built on it.
//!
//! # Overview
//!
//! - **Engine** ([`engine`]): readers, processors and writers, the chunk
//!   executor with its skip policy, tasklet and chunk steps, and the job
//!   launcher that validates parameters, runs steps in order and records
//!   every run in a [`JobRepository`](engine::JobRepository)
//! - **Billing** ([`billing`]): the `BillingJob` itself. It stages the input
//!   file, ingests it into the `billing_data` table and writes a report of
//!   the accounts whose monthly spending reaches a threshold
//! - **Infrastructure**: environment configuration ([`config`]), the
//!   SQLite pool with its embedded migrations ([`db`]) and the command-line
//!   definitions ([`cli`])
//!
//! # Example
//!
//! ```no_run
//! use billing_batch::billing::{billing_job, BillingParameters};
//! use billing_batch::config::BatchConfig;
//! use billing_batch::engine::{JobLauncher, SqliteJobRepository};
//! use billing_batch::db::{connect, DbConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> billing_batch::Result<()> {
//! let pool = connect(&DbConfig::from_env()).await?;
//! let job = billing_job(pool.clone(), BatchConfig::from_env()?)?;
//! let launcher = JobLauncher::new(Arc::new(SqliteJobRepository::new(pool)));
//!
//! let parameters = BillingParameters::new("input/billing-2023-01.csv", "out/report.csv", 2023, 1)
//!     .into_run_parameters();
//! let result = launcher.run(&job, parameters).await?;
//! println!("{}: {}", result.job_name, result.status);
//! # Ok(())
//! # }
//! ```

pub mod billing;
pub mod cli;
pub mod config;
pub mod engine;
pub mod db;
pub mod error;

// Re-export commonly used types
pub use error::{BatchError, Result};
