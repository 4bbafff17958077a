pub mod browser_fetcher;
pub mod http_fetcher;

pub use browser_fetcher::BrowserFetcher;
pub use http_fetcher::HttpFetcher;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::config::{FetchMode, FetcherConfig};
use crate::models::SessionContext;

/// One page request built by the collector.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub url: String,
    /// 1-based page number within the run
    pub page: u32,
    pub session: Option<SessionContext>,
}

impl PageRequest {
    pub fn new(url: impl Into<String>, page: u32) -> Self {
        Self {
            url: url.into(),
            page,
            session: None,
        }
    }

    pub fn with_session(mut self, session: Option<SessionContext>) -> Self {
        self.session = session;
        self
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("bot wall detected at {url}")]
    Blocked { url: String },

    /// The supplied session no longer grants access. Fatal for the run.
    #[error("session expired or rejected at {url}")]
    SessionExpired { url: String },

    /// The fetcher itself cannot work (driver gone, client unusable). Fatal for the run.
    #[error("fetcher unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Whether the whole run must stop instead of degrading this page to empty.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::SessionExpired { .. } | FetchError::Unavailable(_)
        )
    }
}

/// Retrieves the raw markup of one page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Box<T> {
    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchError> {
        (**self).fetch(request).await
    }
}

/// Either fetcher, chosen per source by its fetch mode.
pub enum SourceFetcher {
    Http(HttpFetcher),
    Browser(BrowserFetcher),
}

impl SourceFetcher {
    pub async fn for_mode(mode: FetchMode, config: &FetcherConfig) -> Result<Self, FetchError> {
        Ok(match mode {
            FetchMode::Http => SourceFetcher::Http(HttpFetcher::new(config.clone())?),
            FetchMode::Browser => {
                SourceFetcher::Browser(BrowserFetcher::connect(config.clone()).await?)
            }
        })
    }

    /// Release whatever session the fetcher holds.
    pub async fn close(self) -> Result<(), FetchError> {
        match self {
            SourceFetcher::Http(_) => Ok(()),
            SourceFetcher::Browser(browser) => browser.close().await,
        }
    }
}

#[async_trait]
impl PageFetcher for SourceFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchError> {
        match self {
            SourceFetcher::Http(http) => http.fetch(request).await,
            SourceFetcher::Browser(browser) => browser.fetch(request).await,
        }
    }
}

/// An unparsable page URL fails that page like any other network error.
pub(crate) fn parse_page_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|e| FetchError::Network {
        url: url.to_string(),
        reason: format!("invalid URL: {}", e),
    })
}

/// Shared checks on fetched markup.
pub(crate) fn inspect_page(
    url: &str,
    final_url: &str,
    html: &str,
    session_expired_markers: &[String],
    blocked_markers: &[String],
) -> Result<(), FetchError> {
    if session_expired_markers
        .iter()
        .any(|m| final_url.contains(m.as_str()))
    {
        return Err(FetchError::SessionExpired {
            url: url.to_string(),
        });
    }

    if blocked_markers.iter().any(|m| html.contains(m.as_str())) {
        return Err(FetchError::Blocked {
            url: url.to_string(),
        });
    }

    Ok(())
}
