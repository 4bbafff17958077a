use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::collector::CollectorError;
use crate::models::{SessionContext, SourceTag};

/// Configuration of a single paginated collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Product id (ASIN) or full listing URL, substituted for `{target}`.
    pub target_id: String,
    pub max_pages: u32,
    #[serde(default)]
    pub delay: DelayRange,
    pub source_tag: SourceTag,
    #[serde(skip)]
    pub session: Option<SessionContext>,
    /// Template with a `{page}` placeholder; defaults to the source's listing URL.
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default = "default_true")]
    pub delay_first_request: bool,
    #[serde(default)]
    pub on_fetch_failure: FetchFailurePolicy,
    #[serde(default = "default_max_consecutive_empty")]
    pub max_consecutive_empty_pages: u32,
}

/// Uniform random wait before each page request, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

/// What a failed page fetch means for the termination rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// The page counts as an empty page and may stop the run.
    #[default]
    TreatAsEmpty,
    /// The page is recorded as failed and the run moves on to the next page.
    Skip,
}

/// Upper bound for a single inter-page wait.
pub const MAX_DELAY_SECS: f64 = 600.0;

fn default_true() -> bool {
    true
}

fn default_max_consecutive_empty() -> u32 {
    1
}

impl CollectorConfig {
    pub fn new(target_id: impl Into<String>, max_pages: u32, source_tag: SourceTag) -> Self {
        Self {
            target_id: target_id.into(),
            max_pages,
            delay: DelayRange::default(),
            source_tag,
            session: None,
            url_template: None,
            delay_first_request: true,
            on_fetch_failure: FetchFailurePolicy::default(),
            max_consecutive_empty_pages: default_max_consecutive_empty(),
        }
    }

    pub fn with_delay(mut self, min_secs: f64, max_secs: f64) -> Self {
        self.delay = DelayRange { min_secs, max_secs };
        self
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_fetch_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.on_fetch_failure = policy;
        self
    }

    pub fn url_template(&self) -> &str {
        self.url_template
            .as_deref()
            .unwrap_or_else(|| self.source_tag.default_url_template())
    }

    /// Build the request URL for a 1-based page number.
    pub fn page_url(&self, page: u32) -> String {
        self.url_template()
            .replace("{target}", &self.target_id)
            .replace("{page}", &page.to_string())
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.target_id.trim().is_empty() {
            return Err(CollectorError::InvalidConfig(
                "target id cannot be empty".to_string(),
            ));
        }

        if self.max_pages == 0 {
            return Err(CollectorError::InvalidConfig(
                "max_pages must be at least 1".to_string(),
            ));
        }

        if !self.url_template().contains("{page}") {
            return Err(CollectorError::InvalidConfig(format!(
                "url template has no {{page}} placeholder: {}",
                self.url_template()
            )));
        }

        if self.max_consecutive_empty_pages == 0 {
            return Err(CollectorError::InvalidConfig(
                "max_consecutive_empty_pages must be at least 1".to_string(),
            ));
        }

        self.delay.validate()
    }
}

impl DelayRange {
    pub fn validate(&self) -> Result<(), CollectorError> {
        if !self.min_secs.is_finite() || !self.max_secs.is_finite() {
            return Err(CollectorError::InvalidConfig(
                "delay bounds must be finite".to_string(),
            ));
        }

        if self.min_secs < 0.0 {
            return Err(CollectorError::InvalidConfig(format!(
                "min delay cannot be negative: {}",
                self.min_secs
            )));
        }

        if self.max_secs > MAX_DELAY_SECS {
            return Err(CollectorError::InvalidConfig(format!(
                "max delay {} exceeds {} seconds",
                self.max_secs, MAX_DELAY_SECS
            )));
        }

        if self.max_secs < self.min_secs {
            return Err(CollectorError::InvalidConfig(format!(
                "max delay {} is below min delay {}",
                self.max_secs, self.min_secs
            )));
        }

        Ok(())
    }

    /// Draw a wait uniformly from `[min_secs, max_secs]`.
    pub fn sample(&self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            rand::thread_rng().gen_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };

        Duration::from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS))
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_secs: 1.0,
            max_secs: 2.0,
        }
    }
}
