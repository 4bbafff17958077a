use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MinioConfigFile {
    minio: MinioSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MinioSection {
    endpoint: String,
    bucket_name: String,
    region: Option<String>,
    path_style: Option<bool>,
    prefix: Option<String>,
    env_access_key: Option<String>,
    env_secret_key: Option<String>,
}

/// Connection settings for the object-store sink. Credentials come from the environment.
#[derive(Debug, Clone)]
pub struct MinioConfig {
    pub endpoint: String,
    pub bucket_name: String,
    pub region: Option<String>,
    pub path_style: Option<bool>,
    /// Key prefix for uploaded review files
    pub prefix: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub env_access_key: Option<String>,
    pub env_secret_key: Option<String>,
}

impl MinioConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read MinIO config file: {}", path))?;

        let config_file: MinioConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse MinIO config file: {}", path))?;

        let section = config_file.minio;
        let mut config = Self {
            endpoint: section.endpoint,
            bucket_name: section.bucket_name,
            region: section.region,
            path_style: section.path_style,
            prefix: section.prefix,
            access_key: None,
            secret_key: None,
            env_access_key: section.env_access_key,
            env_secret_key: section.env_secret_key,
        };

        config.load_credentials()?;

        Ok(config)
    }

    pub fn load_credentials(&mut self) -> Result<()> {
        let access_key_var = self.env_access_key.as_deref().unwrap_or("MINIO_ACCESS_KEY");
        let secret_key_var = self.env_secret_key.as_deref().unwrap_or("MINIO_SECRET_KEY");

        self.access_key = Some(
            env::var(access_key_var)
                .with_context(|| format!("Missing environment variable: {}", access_key_var))?,
        );

        self.secret_key = Some(
            env::var(secret_key_var)
                .with_context(|| format!("Missing environment variable: {}", secret_key_var))?,
        );

        Ok(())
    }

    pub fn get_access_key(&self) -> Result<&str> {
        self.access_key
            .as_deref()
            .ok_or_else(|| anyhow!("Access key not loaded"))
    }

    pub fn get_secret_key(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| anyhow!("Secret key not loaded"))
    }

    pub fn is_path_style(&self) -> bool {
        self.path_style.unwrap_or(true)
    }

    pub fn get_region(&self) -> &str {
        self.region.as_deref().unwrap_or("us-east-1")
    }

    pub fn get_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("reviews")
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(anyhow!("MinIO endpoint cannot be empty"));
        }

        if self.bucket_name.is_empty() {
            return Err(anyhow!("MinIO bucket name cannot be empty"));
        }

        if self.access_key.is_none() || self.secret_key.is_none() {
            return Err(anyhow!("MinIO credentials not loaded"));
        }

        Ok(())
    }
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket_name: "product-reviews".to_string(),
            region: Some("us-east-1".to_string()),
            path_style: Some(true),
            prefix: None,
            access_key: None,
            secret_key: None,
            env_access_key: None,
            env_secret_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MinioConfig::default();
        assert_eq!(config.bucket_name, "product-reviews");
        assert_eq!(config.get_region(), "us-east-1");
        assert_eq!(config.get_prefix(), "reviews");
        assert!(config.is_path_style());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_loading() {
        unsafe {
            env::set_var("TEST_REVIEWS_ACCESS_KEY", "test_access");
            env::set_var("TEST_REVIEWS_SECRET_KEY", "test_secret");
        }

        let mut config = MinioConfig::default();
        config.env_access_key = Some("TEST_REVIEWS_ACCESS_KEY".to_string());
        config.env_secret_key = Some("TEST_REVIEWS_SECRET_KEY".to_string());

        assert!(config.load_credentials().is_ok());
        assert_eq!(config.get_access_key().unwrap(), "test_access");
        assert_eq!(config.get_secret_key().unwrap(), "test_secret");
        assert!(config.validate().is_ok());

        unsafe {
            env::remove_var("TEST_REVIEWS_ACCESS_KEY");
            env::remove_var("TEST_REVIEWS_SECRET_KEY");
        }
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = MinioConfig::default();
        config.env_access_key = Some("TEST_REVIEWS_UNSET_ACCESS_KEY".to_string());
        assert!(config.load_credentials().is_err());
    }
}
