use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use wreq::Client;
use wreq_util::Emulation;

use super::{FetchError, PageFetcher, PageRequest, inspect_page, parse_page_url};
use crate::config::FetcherConfig;

/// Plain HTTP fetcher for sites that serve reviews as server-rendered markup.
pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .emulation(Emulation::Firefox136)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FetchError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(HttpFetcher { client, config })
    }

    fn user_agent<'a>(&'a self, request: &'a PageRequest) -> Option<&'a str> {
        request
            .session
            .as_ref()
            .and_then(|s| s.user_agent.as_deref())
            .or(self.config.user_agent.as_deref())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchError> {
        let url = request.url.as_str();
        let page_url = parse_page_url(url)?;
        let host = page_url.host_str().unwrap_or_default();

        let mut builder = self
            .client
            .get(page_url.as_str())
            .header("Accept-Language", "en-US,en;q=0.9");

        if let Some(user_agent) = self.user_agent(request) {
            builder = builder.header("User-Agent", user_agent);
        }

        if let Some(cookies) = request
            .session
            .as_ref()
            .and_then(|s| s.cookie_header_for(host))
        {
            builder = builder.header("Cookie", cookies);
        }

        let response = builder.send().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let final_url = response.url().to_string();
        let status = response.status();

        if status.as_u16() == 401 && request.session.is_some() {
            return Err(FetchError::SessionExpired {
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: format!("failed to read body: {}", e),
        })?;

        inspect_page(
            url,
            &final_url,
            &html,
            &self.config.session_expired_markers,
            &self.config.blocked_markers,
        )?;

        debug!("Final URL for page {}: {}", request.page, final_url);
        info!("Fetched {} characters from {}", html.len(), url);
        Ok(html)
    }
}
