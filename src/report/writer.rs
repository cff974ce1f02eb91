use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::layout::ReportLayout;
use crate::pipeline::DailyReport;

/// Writes one JSON-lines file per report date into `output_dir`.
///
/// Files are staged under a temporary name and renamed into place, so a
/// reader never observes a half-written report. A date without duplicates
/// still gets an empty file.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    layout: ReportLayout,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, layout: ReportLayout) -> Self {
        Self {
            output_dir: output_dir.into(),
            layout,
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn path_for(&self, report_date: NaiveDate) -> PathBuf {
        self.output_dir
            .join(format!("duplicates-{}.jsonl", report_date.format("%Y-%m-%d")))
    }

    /// Writes `report` and returns the final path.
    ///
    /// # Errors
    /// Fails when the output directory cannot be created or the file cannot be written.
    pub async fn write(&self, report: &DailyReport) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        let path = self.path_for(report.report_date);
        let staging = path.with_extension("jsonl.tmp");

        let mut buffer = Vec::new();
        for record in &report.records {
            serde_json::to_writer(&mut buffer, &self.layout.render_row(record))
                .context("failed to serialize report row")?;
            buffer.push(b'\n');
        }

        let mut file = File::create(&staging)
            .await
            .with_context(|| format!("failed to create {}", staging.display()))?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        file.sync_data().await?;
        drop(file);

        tokio::fs::rename(&staging, &path)
            .await
            .with_context(|| format!("failed to move report into {}", path.display()))?;

        info!(
            report_date = %report.report_date,
            rows = report.records.len(),
            path = %path.display(),
            "duplicate report written"
        );
        Ok(path)
    }
}
