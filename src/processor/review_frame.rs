use anyhow::{Result, anyhow};
use polars::prelude::*;
use tracing::info;

use super::text::length_category;
use crate::models::ReviewBatch;

/// Turns a review batch into the tabular shape sinks export.
///
/// Product metadata, when present, is repeated on every row.
pub struct ReviewFrameBuilder;

impl ReviewFrameBuilder {
    pub fn build(&self, batch: &ReviewBatch) -> Result<DataFrame> {
        let reviews = &batch.reviews;

        let titles: Vec<String> = reviews.iter().map(|r| r.title.clone()).collect();
        let bodies: Vec<String> = reviews.iter().map(|r| r.body.clone()).collect();
        let stars: Vec<Option<f64>> = reviews.iter().map(|r| r.rating).collect();
        let reviewers: Vec<Option<String>> = reviews.iter().map(|r| r.author.clone()).collect();
        let dates: Vec<Option<String>> = reviews.iter().map(|r| r.posted_at.clone()).collect();
        let sources: Vec<String> = reviews.iter().map(|r| r.source.to_string()).collect();

        let word_counts: Vec<u32> = reviews
            .iter()
            .map(|r| r.body.split_whitespace().count() as u32)
            .collect();
        let char_counts: Vec<u32> = reviews
            .iter()
            .map(|r| r.body.chars().count() as u32)
            .collect();
        let categories: Vec<String> = word_counts
            .iter()
            .map(|w| length_category(*w as usize).to_string())
            .collect();

        let mut columns: Vec<Column> = vec![
            Series::new("review_title".into(), titles).into(),
            Series::new("review_body".into(), bodies).into(),
            Series::new("review_stars".into(), stars).into(),
            Series::new("reviewer".into(), reviewers).into(),
            Series::new("review_date".into(), dates).into(),
            Series::new("source".into(), sources).into(),
            Series::new("word_count".into(), word_counts).into(),
            Series::new("length_chars".into(), char_counts).into(),
            Series::new("length_category".into(), categories).into(),
        ];

        if let Some(ref metadata) = batch.metadata {
            for (name, value) in metadata.columns() {
                let values = vec![value; reviews.len()];
                columns.push(Series::new(name.into(), values).into());
            }
        }

        let df = DataFrame::new(columns)
            .map_err(|e| anyhow!("Failed to create review DataFrame: {}", e))?;

        info!(
            "Built review frame for {}: {} rows x {} columns",
            batch.target,
            df.height(),
            df.width()
        );
        Ok(df)
    }
}
