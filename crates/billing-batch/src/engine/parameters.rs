//! Run parameters and their validation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameters supplied when a job is launched
///
/// A plain name to string mapping. Validation happens before any step runs;
/// after that the parameters are read-only for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunParameters(BTreeMap<String, String>);

impl RunParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, returning the updated set
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of a parameter that must be present and non-empty
    pub fn require(&self, key: &str) -> Result<&str, ValidationError> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ValidationError::new(format!(
                "The '{key}' parameter is required."
            ))),
        }
    }

    /// Value of a required parameter parsed as an integer
    pub fn require_i32(&self, key: &str) -> Result<i32, ValidationError> {
        let raw = self.require(key)?;
        raw.trim().parse().map_err(|_| {
            ValidationError::new(format!(
                "The '{key}' parameter must be an integer, got '{raw}'."
            ))
        })
    }

    /// Parse a `key=value` pair as given on the command line
    pub fn parse_pair(pair: &str) -> Result<(String, String), ValidationError> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            },
            _ => Err(ValidationError::new(format!(
                "Expected a parameter in the form key=value, got '{pair}'."
            ))),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for RunParameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Run parameters failed validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Checks run parameters before a job touches anything
///
/// Implementations must be side-effect free and report the first violation
/// they find.
pub trait ParametersValidator: Send + Sync {
    fn validate(&self, parameters: &RunParameters) -> Result<(), ValidationError>;
}

/// Accepts every parameter set
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpValidator;

impl ParametersValidator for NoOpValidator {
    fn validate(&self, _parameters: &RunParameters) -> Result<(), ValidationError> {
        Ok(())
    }
}
