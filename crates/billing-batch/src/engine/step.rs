//! Steps and their results
//!
//! A job is an ordered list of [`Step`]s. Two kinds exist:
//!
//! - [`TaskletStep`]: runs a single [`Tasklet`] once (e.g. staging a file)
//! - [`ChunkStep`]: reads, transforms and writes items in chunks through
//!   [`execute_chunked`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, instrument};

use super::chunk::{execute_chunked, ChunkConfig};
use super::fault::FaultHandler;
use super::item::{ItemProcessor, ItemReader, ItemWriter, PassThroughProcessor};
use crate::error::{BatchError, Result};

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(StepStatus::Completed),
            "FAILED" => Ok(StepStatus::Failed),
            other => Err(format!("unknown step status '{other}'")),
        }
    }
}

/// Item counters accumulated while a step runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepContribution {
    /// Well-formed items pulled from the reader
    pub read_count: u64,
    /// Items handed to the writer in committed chunks
    pub write_count: u64,
    /// Items the processor dropped
    pub filter_count: u64,
    /// Faults skipped
    pub skip_count: u64,
}

/// Outcome of one step execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub status: StepStatus,
    pub read_count: u64,
    pub write_count: u64,
    pub filter_count: u64,
    pub skip_count: u64,
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl StepResult {
    pub fn completed(
        step_name: impl Into<String>,
        counts: StepContribution,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::finish(step_name.into(), StepStatus::Completed, counts, None, started_at)
    }

    pub fn failed(
        step_name: impl Into<String>,
        counts: StepContribution,
        started_at: DateTime<Utc>,
        failure: impl Into<String>,
    ) -> Self {
        Self::finish(
            step_name.into(),
            StepStatus::Failed,
            counts,
            Some(failure.into()),
            started_at,
        )
    }

    fn finish(
        step_name: String,
        status: StepStatus,
        counts: StepContribution,
        failure: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            step_name,
            status,
            read_count: counts.read_count,
            write_count: counts.write_count,
            filter_count: counts.filter_count,
            skip_count: counts.skip_count,
            failure,
            started_at,
            ended_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

// ============================================================================
// Step trait
// ============================================================================

/// A unit of work within a job
///
/// `execute` never returns an error: every failure is folded into a
/// [`StepResult`] with status `FAILED` so the orchestrator can record it.
#[async_trait]
pub trait Step: Send {
    fn name(&self) -> &str;

    async fn execute(&mut self) -> StepResult;
}

// ============================================================================
// Tasklet step
// ============================================================================

/// Work done in one shot rather than item by item
#[async_trait]
pub trait Tasklet: Send + Sync {
    async fn execute(&self) -> Result<()>;
}

pub struct TaskletStep {
    name: String,
    tasklet: Box<dyn Tasklet>,
}

impl TaskletStep {
    pub fn new(name: impl Into<String>, tasklet: impl Tasklet + 'static) -> Self {
        Self {
            name: name.into(),
            tasklet: Box::new(tasklet),
        }
    }
}

#[async_trait]
impl Step for TaskletStep {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(step = %self.name))]
    async fn execute(&mut self) -> StepResult {
        let started_at = Utc::now();

        match self.tasklet.execute().await {
            Ok(()) => {
                info!("Step completed");
                StepResult::completed(&self.name, StepContribution::default(), started_at)
            },
            Err(e) => {
                error!(error = %e, "Step failed");
                StepResult::failed(
                    &self.name,
                    StepContribution::default(),
                    started_at,
                    e.to_string(),
                )
            },
        }
    }
}

// ============================================================================
// Chunk step
// ============================================================================

/// Chunk-oriented step reading `I` and writing `O`
pub struct ChunkStep<I, O> {
    name: String,
    reader: Box<dyn ItemReader<I>>,
    processor: Box<dyn ItemProcessor<I, O>>,
    writer: Box<dyn ItemWriter<O>>,
    fault_handler: Option<Box<dyn FaultHandler>>,
    config: ChunkConfig,
}

impl<I, O> ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    pub fn builder(name: impl Into<String>) -> ChunkStepBuilder<I, O> {
        ChunkStepBuilder::new(name)
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }
}

#[async_trait]
impl<I, O> Step for ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self) -> StepResult {
        let fault_handler = self
            .fault_handler
            .as_mut()
            .map(|handler| &mut **handler as &mut dyn FaultHandler);

        execute_chunked(
            &self.name,
            self.reader.as_mut(),
            self.processor.as_ref(),
            self.writer.as_mut(),
            fault_handler,
            &self.config,
        )
        .await
    }
}

/// Builder for [`ChunkStep`]
///
/// ```rust,ignore
/// let step = ChunkStep::builder("fileIngestion")
///     .reader(BillingFileReader::new(&staged_file))
///     .pass_through()
///     .writer(BillingTableWriter::new(pool.clone()))
///     .fault_handler(SkipFileFaultHandler::new(&skip_file))
///     .chunk_size(100)
///     .skip_limit(10)
///     .build()?;
/// ```
pub struct ChunkStepBuilder<I, O> {
    name: String,
    reader: Option<Box<dyn ItemReader<I>>>,
    processor: Option<Box<dyn ItemProcessor<I, O>>>,
    writer: Option<Box<dyn ItemWriter<O>>>,
    fault_handler: Option<Box<dyn FaultHandler>>,
    config: ChunkConfig,
}

impl<I, O> ChunkStepBuilder<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reader: None,
            processor: None,
            writer: None,
            fault_handler: None,
            config: ChunkConfig::default(),
        }
    }

    pub fn reader(mut self, reader: impl ItemReader<I> + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    pub fn processor(mut self, processor: impl ItemProcessor<I, O> + 'static) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    pub fn writer(mut self, writer: impl ItemWriter<O> + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn fault_handler(mut self, handler: impl FaultHandler + 'static) -> Self {
        self.fault_handler = Some(Box::new(handler));
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    pub fn skip_limit(mut self, skip_limit: u64) -> Self {
        self.config.skip_limit = skip_limit;
        self
    }

    pub fn config(mut self, config: ChunkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ChunkStep<I, O>> {
        self.config.validate()?;

        let reader = self.reader.ok_or_else(|| {
            BatchError::config(format!("step '{}' has no reader", self.name))
        })?;
        let processor = self.processor.ok_or_else(|| {
            BatchError::config(format!("step '{}' has no processor", self.name))
        })?;
        let writer = self.writer.ok_or_else(|| {
            BatchError::config(format!("step '{}' has no writer", self.name))
        })?;

        Ok(ChunkStep {
            name: self.name,
            reader,
            processor,
            writer,
            fault_handler: self.fault_handler,
            config: self.config,
        })
    }
}

impl<T> ChunkStepBuilder<T, T>
where
    T: Send + Sync + 'static,
{
    /// Write items exactly as read
    pub fn pass_through(self) -> Self {
        self.processor(PassThroughProcessor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::fault::Fault;
    use crate::engine::item::{ListItemReader, ListItemWriter, ReadItem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTasklet {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Tasklet for CountingTasklet {
        async fn execute(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BatchError::staging("source file not found"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_tasklet_step_success() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut step = TaskletStep::new(
            "filePreparation",
            CountingTasklet {
                runs: runs.clone(),
                fail: false,
            },
        );

        let result = step.execute().await;
        assert!(result.is_success());
        assert_eq!(result.step_name, "filePreparation");
        assert_eq!(result.read_count, 0);
        assert!(result.ended_at >= result.started_at);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tasklet_step_failure_is_captured() {
        let mut step = TaskletStep::new(
            "filePreparation",
            CountingTasklet {
                runs: Arc::new(AtomicUsize::new(0)),
                fail: true,
            },
        );

        let result = step.execute().await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(
            result.failure.as_deref(),
            Some("Staging failure: source file not found")
        );
    }

    #[tokio::test]
    async fn test_chunk_step_runs_executor() {
        let reader = ListItemReader::new(vec![
            ReadItem::Item(1),
            ReadItem::Fault(Fault::new(2, "oops", "bad")),
            ReadItem::Item(3),
        ]);
        let mut step = ChunkStep::<i32, i32>::builder("copy")
            .reader(reader)
            .pass_through()
            .writer(ListItemWriter::new())
            .chunk_size(10)
            .skip_limit(1)
            .build()
            .unwrap();

        let result = step.execute().await;
        assert!(result.is_success());
        assert_eq!(result.read_count, 2);
        assert_eq!(result.write_count, 2);
        assert_eq!(result.skip_count, 1);
    }

    #[test]
    fn test_builder_requires_parts() {
        let missing_writer = ChunkStep::<i32, i32>::builder("copy")
            .reader(ListItemReader::from_items(vec![1]))
            .pass_through()
            .build();
        assert!(matches!(missing_writer, Err(BatchError::Config(_))));

        let zero_chunk = ChunkStep::<i32, i32>::builder("copy")
            .reader(ListItemReader::from_items(vec![1]))
            .pass_through()
            .writer(ListItemWriter::new())
            .chunk_size(0)
            .build();
        assert!(matches!(zero_chunk, Err(BatchError::Config(_))));
    }

    #[test]
    fn test_status_round_trip_through_str() {
        assert_eq!("COMPLETED".parse::<StepStatus>().unwrap(), StepStatus::Completed);
        assert_eq!(StepStatus::Failed.to_string(), "FAILED");
        assert!("RUNNING".parse::<StepStatus>().is_err());
    }
}
