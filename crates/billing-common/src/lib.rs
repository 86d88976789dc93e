//! Billing Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the billing batch workspace.
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Checksums**: file integrity verification used when staging input files
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use billing_common::checksum::{compute_file_checksum, ChecksumAlgorithm};
//!
//! fn fingerprint(path: &str) -> billing_common::Result<String> {
//!     compute_file_checksum(path, ChecksumAlgorithm::Sha256)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
