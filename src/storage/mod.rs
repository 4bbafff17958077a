pub mod local_sink;
pub mod minio_client;

pub use local_sink::LocalFileSink;
pub use minio_client::{MinioSink, MinioStorage};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::Path;
use tracing::{error, info};

use crate::collector::SeenSet;
use crate::models::ReviewBatch;

/// Persists the final, deduplicated review set of a run.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Returns where the batch ended up (file path or object key).
    async fn persist(&self, batch: &ReviewBatch) -> Result<String>;
}

/// Hand the batch to every sink, then record its fingerprints.
///
/// The seen-set snapshot is written only after every sink succeeded. If any export fails the
/// snapshot is left untouched, so the next run collects those reviews again.
pub async fn persist_batch(
    sinks: &[Box<dyn RecordSink>],
    batch: &ReviewBatch,
    seen: &SeenSet,
    seen_set_path: Option<&Path>,
) -> Result<Vec<String>> {
    let mut locations = Vec::new();
    let mut failures = 0;

    for sink in sinks {
        match sink.persist(batch).await {
            Ok(location) => {
                info!("Saved review batch to {}", location);
                locations.push(location);
            }
            Err(e) => {
                error!("❌ Failed to save review batch: {:#}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!(
            "{} of {} sinks failed, seen-set snapshot not updated",
            failures,
            sinks.len()
        ));
    }

    if let Some(path) = seen_set_path {
        seen.save(path)?;
    }

    Ok(locations)
}

/// Reduce a target (an ASIN or a whole listing URL) to something usable in a file name.
pub(crate) fn file_safe_name(target: &str) -> String {
    let mut name: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while name.contains("__") {
        name = name.replace("__", "_");
    }

    let name = name.trim_matches('_');
    name.chars().take(80).collect()
}
