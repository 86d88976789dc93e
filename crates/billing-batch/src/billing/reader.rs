//! Billing record readers
//!
//! - [`BillingFileReader`]: lines of the staged input file, with unparseable
//!   lines surfaced as faults
//! - [`BillingTableReader`]: rows of one billing period from `billing_data`,
//!   fetched page by page in insertion order

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::record::BillingData;
use crate::engine::{Fault, ItemReader, ReadItem};
use crate::error::{BatchError, Result};

// ============================================================================
// File reader
// ============================================================================

/// Reads billing records from a comma-separated file
///
/// Line numbers are 1-based and count every physical line. Blank lines are
/// passed over without producing a record or a fault. A line that is not
/// valid UTF-8 is a fault like any other unparseable line.
pub struct BillingFileReader {
    path: PathBuf,
    input: Option<BufReader<File>>,
    buf: Vec<u8>,
    line_number: u64,
}

impl BillingFileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            input: None,
            buf: Vec::new(),
            line_number: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ItemReader<BillingData> for BillingFileReader {
    async fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path).await.map_err(|e| {
            BatchError::source_failure(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        self.input = Some(BufReader::new(file));
        self.line_number = 0;

        debug!(path = %self.path.display(), "Billing file opened");
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<ReadItem<BillingData>>> {
        let input = self.input.as_mut().ok_or_else(|| {
            BatchError::source_failure(format!("{} was read before being opened", self.path.display()))
        })?;

        loop {
            self.buf.clear();
            let read = input.read_until(b'\n', &mut self.buf).await.map_err(|e| {
                BatchError::source_failure(format!(
                    "cannot read line {} of {}: {}",
                    self.line_number + 1,
                    self.path.display(),
                    e
                ))
            })?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let bytes = trim_line_ending(&self.buf);
            let line = match std::str::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    let raw = String::from_utf8_lossy(bytes).into_owned();
                    let reason = format!("line is not valid UTF-8: {e}");
                    return Ok(Some(ReadItem::Fault(Fault::new(self.line_number, raw, reason))));
                },
            };

            if line.trim().is_empty() {
                continue;
            }

            let item = match BillingData::parse_line(line) {
                Ok(data) => ReadItem::Item(data),
                Err(e) => ReadItem::Fault(Fault::new(self.line_number, line, e.to_string())),
            };
            return Ok(Some(item));
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// ============================================================================
// Table reader
// ============================================================================

/// Default number of rows fetched per query.
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(sqlx::FromRow)]
struct BillingRow {
    id: i64,
    #[sqlx(flatten)]
    data: BillingData,
}

/// Reads the `billing_data` rows of one billing period
///
/// Rows come back in insertion order. Only one page is held in memory at a
/// time; the next page starts after the last row id seen.
pub struct BillingTableReader {
    pool: SqlitePool,
    data_year: i32,
    data_month: i32,
    page_size: usize,
    last_id: i64,
    page: VecDeque<BillingData>,
    exhausted: bool,
}

impl BillingTableReader {
    pub fn new(pool: SqlitePool, data_year: i32, data_month: i32) -> Self {
        Self {
            pool,
            data_year,
            data_month,
            page_size: DEFAULT_PAGE_SIZE,
            last_id: 0,
            page: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let rows: Vec<BillingRow> = sqlx::query_as(
            r#"
            SELECT id, data_year, data_month, account_id, phone_number,
                   data_usage, call_duration, sms_count
            FROM billing_data
            WHERE data_year = ? AND data_month = ? AND id > ?
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(self.data_year)
        .bind(self.data_month)
        .bind(self.last_id)
        .bind(self.page_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BatchError::source_failure(format!("cannot query billing_data: {e}")))?;

        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.last_id = last.id;
        }

        debug!(
            rows = rows.len(),
            last_id = self.last_id,
            "Fetched billing_data page"
        );

        self.page.extend(rows.into_iter().map(|row| row.data));
        Ok(())
    }
}

#[async_trait]
impl ItemReader<BillingData> for BillingTableReader {
    async fn open(&mut self) -> Result<()> {
        self.last_id = 0;
        self.page.clear();
        self.exhausted = false;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<ReadItem<BillingData>>> {
        if self.page.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.page.pop_front().map(ReadItem::Item))
    }
}
