//! Billing record writers
//!
//! - [`BillingTableWriter`]: inserts each chunk into `billing_data` inside a
//!   single transaction, optionally clearing one billing period first so a
//!   re-run replaces that period's rows
//! - [`BillingReportWriter`]: appends each chunk to the report file as
//!   comma-separated lines

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::record::{BillingData, ReportingData};
use crate::engine::ItemWriter;
use crate::error::{BatchError, Result};

// ============================================================================
// Table writer
// ============================================================================

#[derive(Debug, Clone)]
pub struct BillingTableWriter {
    pool: SqlitePool,
    period: Option<(i32, i32)>,
}

impl BillingTableWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, period: None }
    }

    /// Delete the rows of `data_year`/`data_month` when the writer opens
    pub fn replacing_period(mut self, data_year: i32, data_month: i32) -> Self {
        self.period = Some((data_year, data_month));
        self
    }

    async fn insert_chunk(&self, items: &[BillingData]) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO billing_data
                    (data_year, data_month, account_id, phone_number,
                     data_usage, call_duration, sms_count)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(item.data_year)
            .bind(item.data_month)
            .bind(item.account_id)
            .bind(&item.phone_number)
            .bind(item.data_usage)
            .bind(item.call_duration)
            .bind(item.sms_count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

#[async_trait]
impl ItemWriter<BillingData> for BillingTableWriter {
    async fn open(&mut self) -> Result<()> {
        let Some((data_year, data_month)) = self.period else {
            return Ok(());
        };

        let deleted = sqlx::query("DELETE FROM billing_data WHERE data_year = ? AND data_month = ?")
            .bind(data_year)
            .bind(data_month)
            .execute(&self.pool)
            .await
            .map_err(|e| BatchError::sink(format!("cannot clear billing_data: {e}")))?
            .rows_affected();

        if deleted > 0 {
            info!(data_year, data_month, deleted, "Replacing previously ingested billing period");
        }
        Ok(())
    }

    async fn write(&mut self, items: &[BillingData]) -> Result<()> {
        self.insert_chunk(items)
            .await
            .map_err(|e| BatchError::sink(format!("cannot insert into billing_data: {e}")))?;

        debug!(rows = items.len(), "Inserted billing_data chunk");
        Ok(())
    }
}

// ============================================================================
// Report writer
// ============================================================================

/// Writes the billing report
///
/// One line per record: the seven billing fields followed by the total,
/// rounded to two decimals. No header; every line ends with `\n`. The file
/// is truncated when the writer is opened.
pub struct BillingReportWriter {
    path: PathBuf,
    file: Option<File>,
}

impl BillingReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sink_error(path: &Path, action: &str, e: impl std::fmt::Display) -> BatchError {
    BatchError::sink(format!("cannot {} {}: {}", action, path.display(), e))
}

/// Render report lines for a chunk
fn render(items: &[ReportingData]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for item in items {
        let data = &item.billing_data;
        writer.serialize((
            data.data_year,
            data.data_month,
            data.account_id,
            &data.phone_number,
            data.data_usage,
            data.call_duration,
            data.sms_count,
            // Totals are reported to the cent
            format!("{:.2}", item.billing_total),
        ))?;
    }

    writer
        .into_inner()
        .map_err(|e| BatchError::sink(format!("cannot render report lines: {e}")))
}

#[async_trait]
impl ItemWriter<ReportingData> for BillingReportWriter {
    async fn open(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| sink_error(&self.path, "create the directory of", e))?;
        }

        let file = File::create(&self.path)
            .await
            .map_err(|e| sink_error(&self.path, "create", e))?;
        self.file = Some(file);

        debug!(path = %self.path.display(), "Report file opened");
        Ok(())
    }

    async fn write(&mut self, items: &[ReportingData]) -> Result<()> {
        let bytes = render(items)?;

        let Some(file) = self.file.as_mut() else {
            return Err(sink_error(&self.path, "write to", "writer is not open"));
        };

        file.write_all(&bytes)
            .await
            .map_err(|e| sink_error(&self.path, "write to", e))?;
        file.flush()
            .await
            .map_err(|e| sink_error(&self.path, "flush", e))?;

        debug!(lines = items.len(), "Report chunk written");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(|e| sink_error(&self.path, "flush", e))?;
            file.sync_all().await.map_err(|e| sink_error(&self.path, "sync", e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::db::{connect, DbConfig};
    use tempfile::TempDir;

    fn record(account_id: i64) -> BillingData {
        BillingData {
            data_year: 2023,
            data_month: 1,
            account_id,
            phone_number: "+1-202-555-0171".to_string(),
            data_usage: 443.32,
            call_duration: 92,
            sms_count: 51,
        }
    }

    async fn count_rows(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM billing_data")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_table_writer_inserts_chunk() {
        let pool = connect(&DbConfig::in_memory()).await.unwrap();
        let mut writer = BillingTableWriter::new(pool.clone());

        writer.write(&[record(1), record(2)]).await.unwrap();
        writer.write(&[record(3)]).await.unwrap();

        assert_eq!(count_rows(&pool).await, 3);
    }

    #[tokio::test]
    async fn test_table_writer_chunk_is_atomic() {
        let pool = connect(&DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_account_13 BEFORE INSERT ON billing_data \
             WHEN NEW.account_id = 13 BEGIN SELECT RAISE(ABORT, 'unlucky'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        let mut writer = BillingTableWriter::new(pool.clone());

        let err = writer
            .write(&[record(11), record(12), record(13)])
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Sink(_)));
        assert_eq!(count_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_table_writer_replaces_its_period_on_open() {
        let pool = connect(&DbConfig::in_memory()).await.unwrap();
        let mut other_period = record(50);
        other_period.data_month = 2;
        BillingTableWriter::new(pool.clone())
            .write(&[record(1), record(2), other_period])
            .await
            .unwrap();

        let mut writer = BillingTableWriter::new(pool.clone()).replacing_period(2023, 1);
        writer.open().await.unwrap();
        assert_eq!(count_rows(&pool).await, 1);

        writer.write(&[record(1), record(2)]).await.unwrap();
        writer.close().await.unwrap();
        assert_eq!(count_rows(&pool).await, 3);

        // Without a period nothing is cleared
        BillingTableWriter::new(pool.clone()).open().await.unwrap();
        assert_eq!(count_rows(&pool).await, 3);
    }

    #[tokio::test]
    async fn test_report_writer_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.csv");
        let mut writer = BillingReportWriter::new(&path);

        writer.open().await.unwrap();
        writer
            .write(&[ReportingData {
                billing_data: record(100),
                billing_total: 55.4332 + 46.0 + 5.1,
            }])
            .await
            .unwrap();
        writer
            .write(&[ReportingData {
                billing_data: record(101),
                billing_total: 200.0,
            }])
            .await
            .unwrap();
        writer.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "2023,1,100,+1-202-555-0171,443.32,92,51,106.53\n\
             2023,1,101,+1-202-555-0171,443.32,92,51,200.00\n"
        );
    }

    #[test]
    fn test_report_total_is_rounded_to_cents() {
        let lines = render(&[
            ReportingData {
                billing_data: record(1),
                billing_total: 150.004,
            },
            ReportingData {
                billing_data: record(2),
                billing_total: 150.0051,
            },
        ])
        .unwrap();

        let content = String::from_utf8(lines).unwrap();
        let totals: Vec<&str> = content.lines().filter_map(|l| l.rsplit(',').next()).collect();
        assert_eq!(totals, vec!["150.00", "150.01"]);
    }

    #[tokio::test]
    async fn test_report_writer_truncates_previous_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "old line\nanother old line\n").unwrap();

        let mut writer = BillingReportWriter::new(&path);
        writer.open().await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_report_writer_requires_open() {
        let mut writer = BillingReportWriter::new("unused.csv");
        let err = writer.write(&[]).await.unwrap_err();
        assert!(matches!(err, BatchError::Sink(_)));
    }
}
