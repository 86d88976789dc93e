//! Job orchestration
//!
//! A [`Job`] pairs a parameter validator with a step assembler. The
//! [`JobLauncher`] validates the run parameters, asks the job for its steps,
//! runs them strictly in order and stops at the first failed step. Whatever
//! the outcome, the resulting [`JobResult`] is persisted exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::parameters::{NoOpValidator, ParametersValidator, RunParameters};
use super::repository::JobRepository;
use super::step::{Step, StepResult};
use crate::error::{BatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Outcome of one job run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub id: Uuid,
    pub job_name: String,
    pub parameters: RunParameters,
    /// Results of the steps that ran, in execution order
    pub steps: Vec<StepResult>,
    pub status: JobStatus,
    /// Validation message or `step '<name>' failed: <cause>`
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_name == name)
    }
}

/// A job run in progress
struct JobExecution {
    id: Uuid,
    job_name: String,
    parameters: RunParameters,
    steps: Vec<StepResult>,
    started_at: DateTime<Utc>,
}

impl JobExecution {
    fn start(job_name: &str, parameters: RunParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            parameters,
            steps: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn finish(self, status: JobStatus, failure: Option<String>) -> JobResult {
        JobResult {
            id: self.id,
            job_name: self.job_name,
            parameters: self.parameters,
            steps: self.steps,
            status,
            failure,
            started_at: self.started_at,
            ended_at: Utc::now(),
        }
    }

    fn complete(self) -> JobResult {
        self.finish(JobStatus::Completed, None)
    }

    fn fail(self, failure: String) -> JobResult {
        self.finish(JobStatus::Failed, Some(failure))
    }
}

type StepAssembler = dyn Fn(&RunParameters) -> Result<Vec<Box<dyn Step>>> + Send + Sync;

/// A named, validated sequence of steps
///
/// Steps are assembled from the parameters only after they pass validation,
/// so assembling may rely on every validated parameter being present.
pub struct Job {
    name: String,
    validator: Box<dyn ParametersValidator>,
    assembler: Box<StepAssembler>,
}

impl Job {
    pub fn builder(name: impl Into<String>) -> JobBuilder {
        JobBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validator(&self) -> &dyn ParametersValidator {
        self.validator.as_ref()
    }

    /// Build the steps for one run
    pub fn assemble(&self, parameters: &RunParameters) -> Result<Vec<Box<dyn Step>>> {
        (self.assembler)(parameters)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish_non_exhaustive()
    }
}

pub struct JobBuilder {
    name: String,
    validator: Box<dyn ParametersValidator>,
    assembler: Option<Box<StepAssembler>>,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            validator: Box::new(NoOpValidator),
            assembler: None,
        }
    }

    pub fn validator(mut self, validator: impl ParametersValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn steps<F>(mut self, assembler: F) -> Self
    where
        F: Fn(&RunParameters) -> Result<Vec<Box<dyn Step>>> + Send + Sync + 'static,
    {
        self.assembler = Some(Box::new(assembler));
        self
    }

    pub fn build(self) -> Result<Job> {
        let assembler = self.assembler.ok_or_else(|| {
            BatchError::config(format!("job '{}' has no steps", self.name))
        })?;

        Ok(Job {
            name: self.name,
            validator: self.validator,
            assembler,
        })
    }
}

/// Runs jobs and records their outcome
#[derive(Clone)]
pub struct JobLauncher {
    repository: Arc<dyn JobRepository>,
}

impl JobLauncher {
    pub fn new(repository: Arc<dyn JobRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.repository
    }

    /// Validate, assemble and run `job`
    ///
    /// A failed job is still an `Ok` result; `Err` only means the outcome
    /// could not be persisted.
    #[instrument(skip_all, fields(job = %job.name()))]
    pub async fn run(&self, job: &Job, parameters: RunParameters) -> Result<JobResult> {
        let execution = JobExecution::start(job.name(), parameters);
        let result = drive(execution, job.validator(), |p| job.assemble(p)).await;
        self.persist(result).await
    }

    /// Run a pre-built step list
    ///
    /// The steps already exist, so nothing in them may have side effects
    /// before `execute` is called.
    #[instrument(skip_all, fields(job = %job_name))]
    pub async fn run_steps(
        &self,
        job_name: &str,
        steps: Vec<Box<dyn Step>>,
        parameters: RunParameters,
        validator: &dyn ParametersValidator,
    ) -> Result<JobResult> {
        let execution = JobExecution::start(job_name, parameters);
        let result = drive(execution, validator, move |_| Ok(steps)).await;
        self.persist(result).await
    }

    async fn persist(&self, result: JobResult) -> Result<JobResult> {
        if let Err(e) = self.repository.persist(&result).await {
            error!(job_id = %result.id, error = %e, "Failed to persist job result");
            return Err(e);
        }
        Ok(result)
    }
}

async fn drive<F>(
    mut execution: JobExecution,
    validator: &dyn ParametersValidator,
    assemble: F,
) -> JobResult
where
    F: FnOnce(&RunParameters) -> Result<Vec<Box<dyn Step>>>,
{
    info!(job_id = %execution.id, "Job started");

    if let Err(e) = validator.validate(&execution.parameters) {
        warn!(error = %e, "Job parameters rejected");
        return execution.fail(e.to_string());
    }

    let steps = match assemble(&execution.parameters) {
        Ok(steps) => steps,
        Err(e) => {
            error!(error = %e, "Job could not be assembled");
            return execution.fail(e.to_string());
        },
    };

    for mut step in steps {
        info!(step = step.name(), "Executing step");
        let result = step.execute().await;

        if !result.is_success() {
            let failure = format!(
                "step '{}' failed: {}",
                result.step_name,
                result.failure.as_deref().unwrap_or("unknown cause")
            );
            error!(step = %result.step_name, "Job failed");
            execution.steps.push(result);
            return execution.fail(failure);
        }

        execution.steps.push(result);
    }

    info!(steps = execution.steps.len(), "Job completed");
    execution.complete()
}
