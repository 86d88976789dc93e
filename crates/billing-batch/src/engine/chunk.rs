//! Chunk-oriented execution
//!
//! [`execute_chunked`] is the engine's inner loop. Items are pulled one at a
//! time, transformed, buffered and handed to the writer whenever the buffer
//! holds `chunk_size` items. Each write is a commit boundary: chunks written
//! before a failure stay written.
//!
//! Parse faults are skipped and counted. Once the count goes past the skip
//! limit the step fails; the fault that crossed the limit is still passed to
//! the fault handler first.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::fault::FaultHandler;
use super::item::{ItemProcessor, ItemReader, ItemWriter, ReadItem};
use super::step::{StepContribution, StepResult};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::{BatchError, Result};

/// Decides when skipped faults become fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipPolicy {
    limit: u64,
}

impl SkipPolicy {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// True once more than `limit` faults have been skipped
    pub fn is_exceeded(&self, skipped: u64) -> bool {
        skipped > self.limit
    }
}

/// Chunk size and skip tolerance of a chunk step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub skip_limit: u64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_limit: 0,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, skip_limit: u64) -> Self {
        Self {
            chunk_size,
            skip_limit,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BatchError::config("chunk size must be greater than 0"));
        }
        Ok(())
    }

    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy::new(self.skip_limit)
    }
}

/// Run one chunk-oriented step to completion
///
/// Never returns an error: configuration problems, source and sink failures,
/// fault handler failures and an exceeded skip limit all produce a `FAILED`
/// result carrying the cause. An invalid chunk size is rejected before the
/// reader or writer is touched.
#[instrument(skip_all, fields(step = %step_name, chunk_size = config.chunk_size))]
pub async fn execute_chunked<I, O>(
    step_name: &str,
    reader: &mut dyn ItemReader<I>,
    processor: &dyn ItemProcessor<I, O>,
    writer: &mut dyn ItemWriter<O>,
    fault_handler: Option<&mut dyn FaultHandler>,
    config: &ChunkConfig,
) -> StepResult
where
    I: Send,
    O: Send + Sync,
{
    let started_at = Utc::now();
    let mut counts = StepContribution::default();

    let outcome = match config.validate() {
        Ok(()) => drive(reader, processor, writer, fault_handler, config, &mut counts).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => {
            info!(
                read = counts.read_count,
                written = counts.write_count,
                filtered = counts.filter_count,
                skipped = counts.skip_count,
                "Step completed"
            );
            StepResult::completed(step_name, counts, started_at)
        },
        Err(e) => {
            error!(
                error = %e,
                read = counts.read_count,
                written = counts.write_count,
                skipped = counts.skip_count,
                "Step failed"
            );
            StepResult::failed(step_name, counts, started_at, e.to_string())
        },
    }
}

async fn drive<I, O>(
    reader: &mut dyn ItemReader<I>,
    processor: &dyn ItemProcessor<I, O>,
    writer: &mut dyn ItemWriter<O>,
    fault_handler: Option<&mut dyn FaultHandler>,
    config: &ChunkConfig,
    counts: &mut StepContribution,
) -> Result<()>
where
    I: Send,
    O: Send + Sync,
{
    reader.open().await.map_err(as_source_failure)?;
    writer.open().await.map_err(as_sink_failure)?;

    match pump(reader, processor, writer, fault_handler, config, counts).await {
        Ok(()) => writer.close().await.map_err(as_sink_failure),
        Err(e) => {
            if let Err(close_err) = writer.close().await {
                warn!(error = %close_err, "Failed to close writer after step failure");
            }
            Err(e)
        },
    }
}

async fn pump<I, O>(
    reader: &mut dyn ItemReader<I>,
    processor: &dyn ItemProcessor<I, O>,
    writer: &mut dyn ItemWriter<O>,
    mut fault_handler: Option<&mut dyn FaultHandler>,
    config: &ChunkConfig,
    counts: &mut StepContribution,
) -> Result<()>
where
    I: Send,
    O: Send + Sync,
{
    let policy = config.skip_policy();
    let mut buffer: Vec<O> = Vec::with_capacity(config.chunk_size);
    let mut chunk_number: u64 = 0;

    while let Some(read) = reader.read().await.map_err(as_source_failure)? {
        match read {
            ReadItem::Item(item) => {
                counts.read_count += 1;
                match processor.process(item) {
                    Some(output) => buffer.push(output),
                    None => counts.filter_count += 1,
                }

                if buffer.len() >= config.chunk_size {
                    chunk_number += 1;
                    commit(writer, &mut buffer, chunk_number, counts).await?;
                }
            },
            ReadItem::Fault(fault) => {
                counts.skip_count += 1;
                warn!(
                    position = fault.position,
                    reason = %fault.reason,
                    skipped = counts.skip_count,
                    "Skipping unparseable record"
                );

                if let Some(handler) = fault_handler.as_mut() {
                    handler.on_fault(&fault).await.map_err(as_fault_handler_failure)?;
                }

                if policy.is_exceeded(counts.skip_count) {
                    return Err(BatchError::SkipLimitExceeded {
                        skipped: counts.skip_count,
                        limit: policy.limit(),
                    });
                }
            },
        }
    }

    if !buffer.is_empty() {
        chunk_number += 1;
        commit(writer, &mut buffer, chunk_number, counts).await?;
    }

    Ok(())
}

async fn commit<O>(
    writer: &mut dyn ItemWriter<O>,
    buffer: &mut Vec<O>,
    chunk_number: u64,
    counts: &mut StepContribution,
) -> Result<()>
where
    O: Send + Sync,
{
    writer.write(buffer.as_slice()).await.map_err(as_sink_failure)?;
    counts.write_count += buffer.len() as u64;

    debug!(chunk = chunk_number, items = buffer.len(), "Chunk committed");

    buffer.clear();
    Ok(())
}

fn as_source_failure(e: BatchError) -> BatchError {
    match e {
        BatchError::Source(_) => e,
        other => BatchError::source_failure(other.to_string()),
    }
}

fn as_sink_failure(e: BatchError) -> BatchError {
    match e {
        BatchError::Sink(_) => e,
        other => BatchError::sink(other.to_string()),
    }
}

fn as_fault_handler_failure(e: BatchError) -> BatchError {
    match e {
        BatchError::FaultHandler(_) => e,
        other => BatchError::fault_handler(other.to_string()),
    }
}
