//! Job execution history
//!
//! The launcher hands every finished [`JobResult`] to a [`JobRepository`]
//! exactly once. `SqliteJobRepository` keeps the history in the
//! `batch_job_execution` and `batch_step_execution` tables.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::job::{JobResult, JobStatus};
use super::parameters::RunParameters;
use super::step::{StepResult, StepStatus};
use crate::error::{BatchError, Result};

/// Metadata store for job results
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Store a finished job and its step results atomically
    async fn persist(&self, result: &JobResult) -> Result<()>;

    /// Most recent runs first
    async fn find_recent(&self, limit: usize) -> Result<Vec<JobResult>>;
}

// ============================================================================
// SQLite
// ============================================================================

#[derive(Debug, Clone)]
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    job_name: String,
    parameters: String,
    status: String,
    failure: Option<String>,
    started_at: String,
    ended_at: String,
}

#[derive(sqlx::FromRow)]
struct StepRow {
    step_name: String,
    status: String,
    read_count: i64,
    write_count: i64,
    filter_count: i64,
    skip_count: i64,
    failure: Option<String>,
    started_at: String,
    ended_at: String,
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn persist(&self, result: &JobResult) -> Result<()> {
        let parameters = serde_json::to_string(&result.parameters)?;

        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO batch_job_execution
                (id, job_name, parameters, status, failure, started_at, ended_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.id.to_string())
        .bind(&result.job_name)
        .bind(parameters)
        .bind(result.status.as_str())
        .bind(&result.failure)
        .bind(format_timestamp(result.started_at))
        .bind(format_timestamp(result.ended_at))
        .execute(&mut *tx)
        .await?;

        for (position, step) in result.steps.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO batch_step_execution
                    (job_execution_id, position, step_name, status, read_count,
                     write_count, filter_count, skip_count, failure, started_at, ended_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(result.id.to_string())
            .bind(position as i64)
            .bind(&step.step_name)
            .bind(step.status.as_str())
            .bind(step.read_count as i64)
            .bind(step.write_count as i64)
            .bind(step.filter_count as i64)
            .bind(step.skip_count as i64)
            .bind(&step.failure)
            .bind(format_timestamp(step.started_at))
            .bind(format_timestamp(step.ended_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(job_id = %result.id, status = %result.status, "Job result persisted");
        Ok(())
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<JobResult>> {
        let jobs: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT id, job_name, parameters, status, failure, started_at, ended_at
            FROM batch_job_execution
            ORDER BY started_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            let steps: Vec<StepRow> = sqlx::query_as(
                r#"
                SELECT step_name, status, read_count, write_count, filter_count,
                       skip_count, failure, started_at, ended_at
                FROM batch_step_execution
                WHERE job_execution_id = ?
                ORDER BY position
                "#,
            )
            .bind(&job.id)
            .fetch_all(&self.pool)
            .await?;

            results.push(job_result_from_rows(job, steps)?);
        }

        Ok(results)
    }
}

fn job_result_from_rows(job: JobRow, steps: Vec<StepRow>) -> Result<JobResult> {
    let steps = steps
        .into_iter()
        .map(|row| {
            Ok(StepResult {
                status: row.status.parse::<StepStatus>().map_err(decode_error)?,
                read_count: row.read_count as u64,
                write_count: row.write_count as u64,
                filter_count: row.filter_count as u64,
                skip_count: row.skip_count as u64,
                failure: row.failure,
                started_at: parse_timestamp(&row.started_at)?,
                ended_at: parse_timestamp(&row.ended_at)?,
                step_name: row.step_name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(JobResult {
        id: Uuid::parse_str(&job.id).map_err(decode_error)?,
        parameters: serde_json::from_str::<RunParameters>(&job.parameters)?,
        status: job.status.parse::<JobStatus>().map_err(decode_error)?,
        failure: job.failure,
        started_at: parse_timestamp(&job.started_at)?,
        ended_at: parse_timestamp(&job.ended_at)?,
        job_name: job.job_name,
        steps,
    })
}

/// Fixed-width UTC timestamps so that text ordering is time ordering
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(decode_error)
}

fn decode_error<E>(e: E) -> BatchError
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    BatchError::Database(sqlx::Error::Decode(e.into()))
}

// ============================================================================
// In memory
// ============================================================================

/// Keeps results in process memory
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    results: Mutex<Vec<JobResult>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything persisted so far, oldest first
    pub async fn results(&self) -> Vec<JobResult> {
        self.results.lock().await.clone()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn persist(&self, result: &JobResult) -> Result<()> {
        self.results.lock().await.push(result.clone());
        Ok(())
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<JobResult>> {
        let results = self.results.lock().await;
        Ok(results.iter().rev().take(limit).cloned().collect())
    }
}
