use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use super::CollectorConfig;
use crate::models::{SessionContext, SourceTag};

/// Configuration for a whole review pipeline run (one product, one or more sources)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub sources: Vec<SourceConfig>,
    pub product: Option<ProductPageConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Shared fetcher behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub user_agent: Option<String>,
    pub timeout_seconds: u64,
    pub webdriver_url: String,
    pub headless: bool,
    /// URL or page fragments that mean the session is no longer valid
    pub session_expired_markers: Vec<String>,
    /// Page fragments of bot walls / captchas
    pub blocked_markers: Vec<String>,
}

/// How a source's pages are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Plain HTTP request, for server-rendered markup
    #[default]
    Http,
    /// Real browser over WebDriver, for pages that need script execution
    Browser,
}

/// One review source (marketplace listing) to collect from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub collector: CollectorConfig,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path to a JSON session file (cookies), if the source needs one
    pub session_file: Option<String>,
    /// Overrides the source's built-in selectors
    pub selectors: Option<ReviewSelectors>,
}

/// Product page to pull metadata from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPageConfig {
    pub source_tag: SourceTag,
    pub url: String,
}

/// Where results go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    pub file_stem: String,
    /// Fingerprints of previously exported reviews, reused across runs when set
    pub seen_set_path: Option<String>,
    pub upload: bool,
}

/// CSS selectors for extracting reviews, each list tried in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSelectors {
    pub review_block: Vec<String>,
    pub title: Vec<String>,
    pub body: Vec<String>,
    pub rating: Vec<String>,
    pub author: Vec<String>,
    pub date: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl PipelineConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config file: {}", path))?;

        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse pipeline config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Get all enabled sources, in configured order
    pub fn enabled_sources(&self) -> Vec<&SourceConfig> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }

    /// Identifier used for naming output artifacts
    pub fn primary_target(&self) -> Option<&str> {
        self.enabled_sources()
            .first()
            .map(|s| s.collector.target_id.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled_sources().is_empty() {
            return Err(anyhow!("No enabled sources configured"));
        }

        for source in self.enabled_sources() {
            source.collector.validate().with_context(|| {
                format!(
                    "Invalid collector config for {} ({})",
                    source.collector.source_tag, source.collector.target_id
                )
            })?;
        }

        if self.output.file_stem.trim().is_empty() {
            return Err(anyhow!("Output file stem cannot be empty"));
        }

        Ok(())
    }
}

impl SourceConfig {
    /// Collector config with the session file (if any) loaded into it
    pub fn resolved_collector(&self) -> Result<CollectorConfig> {
        let mut collector = self.collector.clone();

        if let Some(ref path) = self.session_file {
            let session = SessionContext::from_file(path)?;
            collector.session = Some(session);
        }

        Ok(collector)
    }

    pub fn selectors(&self) -> ReviewSelectors {
        self.selectors
            .clone()
            .unwrap_or_else(|| ReviewSelectors::for_source(self.collector.source_tag))
    }
}

impl ReviewSelectors {
    pub fn for_source(source: SourceTag) -> Self {
        match source {
            SourceTag::Amazon => Self::amazon(),
            SourceTag::Flipkart => Self::flipkart(),
        }
    }

    pub fn amazon() -> Self {
        Self {
            review_block: strings(&["[data-hook='review']"]),
            title: strings(&["[data-hook='review-title']"]),
            body: strings(&["[data-hook='review-body']"]),
            rating: strings(&[
                "[data-hook='review-star-rating']",
                "[data-hook='cmps-review-star-rating']",
                "i.a-icon-star .a-icon-alt",
            ]),
            author: strings(&["span.a-profile-name"]),
            date: strings(&["[data-hook='review-date']"]),
        }
    }

    pub fn flipkart() -> Self {
        Self {
            review_block: strings(&["div._27M-vq", "div.col.EPCmJX"]),
            title: strings(&["p._2-N8zT", "p.z9E0IG"]),
            body: strings(&["div.t-ZTKy", "div.ZmyHeo"]),
            rating: strings(&["div._3LWZlK", "div.XQDdHH"]),
            author: strings(&["p._2sc7ZR._2V5EHH", "p._2NsDsF.AwS1CA"]),
            date: strings(&["p._2sc7ZR:not(._2V5EHH)", "p._2NsDsF:not(.AwS1CA)"]),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_seconds: 20,
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            session_expired_markers: strings(&["/ap/signin", "/account/login"]),
            blocked_markers: strings(&[
                "Type the characters you see in this image",
                "api-services-support@amazon.com",
                "Are you a human?",
            ]),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "output".to_string(),
            file_stem: "product_reviews".to_string(),
            seen_set_path: None,
            upload: false,
        }
    }
}
