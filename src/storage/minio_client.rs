use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tracing::info;
use uuid::Uuid;

use super::{RecordSink, file_safe_name};
use crate::config::MinioConfig;
use crate::models::ReviewBatch;
use crate::processor::ReviewFrameBuilder;

pub struct MinioStorage {
    bucket: Bucket,
}

impl MinioStorage {
    pub fn from_config(config: &MinioConfig) -> Result<Self> {
        config.validate()?;

        let region = Region::Custom {
            region: config.get_region().to_owned(),
            endpoint: config.endpoint.clone(),
        };

        let credentials = Credentials::new(
            Some(config.get_access_key()?),
            Some(config.get_secret_key()?),
            None,
            None,
            None,
        )?;

        let bucket = Bucket::new(&config.bucket_name, region, credentials)?;
        let bucket = if config.is_path_style() {
            *bucket.with_path_style()
        } else {
            *bucket
        };

        Ok(MinioStorage { bucket })
    }

    pub async fn ensure_bucket(&self) -> Result<()> {
        match self.bucket.exists().await {
            Ok(true) => {
                info!("Bucket '{}' already exists", self.bucket.name);
            }
            Ok(false) => {
                let config = s3::BucketConfiguration::default();
                Bucket::create(
                    &self.bucket.name,
                    self.bucket.region.clone(),
                    self.bucket.credentials().await?,
                    config,
                )
                .await
                .map_err(|e| anyhow!("Failed to create bucket: {}", e))?;
                info!("Created bucket: {}", self.bucket.name);
            }
            Err(e) => {
                return Err(anyhow!("Failed to check bucket existence: {}", e));
            }
        }
        Ok(())
    }

    pub async fn store_parquet(&self, key: &str, data: &[u8]) -> Result<String> {
        let response = self.bucket.put_object(key, data).await?;

        if response.status_code() == 200 {
            info!("Stored Parquet file: {}", key);
            Ok(key.to_string())
        } else {
            Err(anyhow!(
                "Failed to store parquet file: HTTP {}",
                response.status_code()
            ))
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket.name
    }
}

/// `<prefix>/<target>/<YYYYmmdd>-<HHMMSS>-<uuid>.parquet`
pub fn review_object_key(prefix: &str, target: &str, at: DateTime<Utc>, id: Uuid) -> String {
    format!(
        "{}/{}/{}-{}.parquet",
        prefix.trim_end_matches('/'),
        file_safe_name(target),
        at.format("%Y%m%d-%H%M%S"),
        id
    )
}

/// Uploads each batch as one Parquet object.
pub struct MinioSink {
    storage: MinioStorage,
    prefix: String,
    frames: ReviewFrameBuilder,
}

impl MinioSink {
    pub fn new(storage: MinioStorage, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            frames: ReviewFrameBuilder,
        }
    }

    pub async fn from_config(config: &MinioConfig) -> Result<Self> {
        let storage = MinioStorage::from_config(config)?;
        storage.ensure_bucket().await?;
        Ok(Self::new(storage, config.get_prefix()))
    }
}

#[async_trait]
impl RecordSink for MinioSink {
    async fn persist(&self, batch: &ReviewBatch) -> Result<String> {
        let mut df = self.frames.build(batch)?;

        let mut buf = Vec::new();
        ParquetWriter::new(&mut buf).finish(&mut df)?;

        let key = review_object_key(&self.prefix, &batch.target, Utc::now(), Uuid::new_v4());
        let key = self.storage.store_parquet(&key, &buf).await?;

        info!(
            "☁️ Uploaded {} reviews to {}/{}",
            df.height(),
            self.storage.bucket_name(),
            key
        );
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Review, SourceTag};
    use chrono::TimeZone;
    use std::env;

    #[test]
    fn test_minio_from_config() {
        let mut config = MinioConfig::default();
        config.access_key = Some("test_access".to_string());
        config.secret_key = Some("test_secret".to_string());

        let storage = MinioStorage::from_config(&config).unwrap();
        assert_eq!(storage.bucket_name(), "product-reviews");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        assert!(MinioStorage::from_config(&MinioConfig::default()).is_err());
    }

    #[test]
    fn test_review_object_key() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let id = Uuid::nil();

        assert_eq!(
            review_object_key("reviews/", "B0CS69DGSW", at, id),
            "reviews/B0CS69DGSW/20240305-140709-00000000-0000-0000-0000-000000000000.parquet"
        );
    }

    #[tokio::test]
    async fn test_sink_upload() {
        // Needs a running MinIO instance
        if env::var("MINIO_TEST_ENABLED").is_ok() {
            let mut config = MinioConfig::default();
            config.bucket_name = "test-reviews".to_string();
            config.access_key = Some("minioadmin".to_string());
            config.secret_key = Some("minioadmin".to_string());

            let storage = MinioStorage::from_config(&config).unwrap();
            storage.ensure_bucket().await.unwrap();

            let sink = MinioSink::new(storage, "reviews");
            let batch = ReviewBatch::new(
                "B0CS69DGSW",
                vec![Review::new("Nice", "Good camera", SourceTag::Amazon)],
            );

            let key = sink.persist(&batch).await.unwrap();
            assert!(key.starts_with("reviews/B0CS69DGSW/"));
        }
    }
}
