use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{RecordSink, file_safe_name};
use crate::config::OutputConfig;
use crate::models::ReviewBatch;
use crate::processor::ReviewFrameBuilder;

/// Writes each batch as a CSV and a Parquet file side by side.
pub struct LocalFileSink {
    directory: PathBuf,
    file_stem: String,
    frames: ReviewFrameBuilder,
}

impl LocalFileSink {
    pub fn new(directory: impl Into<PathBuf>, file_stem: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_stem: file_stem.into(),
            frames: ReviewFrameBuilder,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.directory, &config.file_stem)
    }

    /// `<stem>_<target>_<YYYYmmdd_HHMMSS>` inside the output directory, without extension
    pub fn base_path(&self, target: &str, at: DateTime<Utc>) -> PathBuf {
        self.directory.join(format!(
            "{}_{}_{}",
            self.file_stem,
            file_safe_name(target),
            at.format("%Y%m%d_%H%M%S")
        ))
    }
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create Parquet file: {}", path.display()))?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

#[async_trait]
impl RecordSink for LocalFileSink {
    async fn persist(&self, batch: &ReviewBatch) -> Result<String> {
        std::fs::create_dir_all(&self.directory).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.directory.display()
            )
        })?;

        let mut df = self.frames.build(batch)?;
        let base = self.base_path(&batch.target, Utc::now());
        let csv_path = base.with_extension("csv");
        let parquet_path = base.with_extension("parquet");

        write_csv(&mut df, &csv_path)?;
        write_parquet(&mut df, &parquet_path)?;

        info!(
            "💾 Saved {} reviews to {} and {}",
            df.height(),
            csv_path.display(),
            parquet_path.display()
        );
        Ok(csv_path.display().to_string())
    }
}
