use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use thirtyfour::{ChromiumLikeCapabilities, Cookie, DesiredCapabilities, WebDriver};
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use super::{FetchError, PageFetcher, PageRequest, inspect_page, parse_page_url};
use crate::config::FetcherConfig;
use crate::models::SessionContext;

/// Fetcher backed by a real browser (WebDriver), for pages that need script execution
/// to expose their reviews.
///
/// The browser session is released by `close`, or on drop if `close` was never reached
/// (early return, error, or the owning future being cancelled).
pub struct BrowserFetcher {
    driver: Option<WebDriver>,
    config: FetcherConfig,
    /// Origins whose session cookies were already installed
    session_origins: Mutex<HashSet<String>>,
}

impl BrowserFetcher {
    pub async fn connect(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut caps = DesiredCapabilities::chrome();
        let mut args = vec![
            "--disable-gpu".to_string(),
            "--window-size=1920,1080".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-sandbox".to_string(),
        ];
        if config.headless {
            args.push("--headless=new".to_string());
        }
        if let Some(ref user_agent) = config.user_agent {
            args.push(format!("--user-agent={}", user_agent));
        }

        for arg in &args {
            caps.add_arg(arg)
                .map_err(|e| FetchError::Unavailable(format!("browser capability {}: {}", arg, e)))?;
        }

        let driver = WebDriver::new(config.webdriver_url.as_str(), caps)
            .await
            .map_err(|e| {
                FetchError::Unavailable(format!(
                    "cannot start browser session at {}: {}",
                    config.webdriver_url, e
                ))
            })?;

        driver
            .set_page_load_timeout(Duration::from_secs(config.timeout_seconds))
            .await
            .map_err(|e| FetchError::Unavailable(format!("page load timeout: {}", e)))?;

        info!("Browser session started via {}", config.webdriver_url);

        Ok(Self {
            driver: Some(driver),
            config,
            session_origins: Mutex::new(HashSet::new()),
        })
    }

    /// Quit the browser session.
    pub async fn close(mut self) -> Result<(), FetchError> {
        if let Some(driver) = self.driver.take() {
            driver
                .quit()
                .await
                .map_err(|e| FetchError::Unavailable(format!("quit failed: {}", e)))?;
            info!("Browser session closed");
        }
        Ok(())
    }

    fn driver(&self) -> Result<&WebDriver, FetchError> {
        self.driver
            .as_ref()
            .ok_or_else(|| FetchError::Unavailable("browser session already closed".to_string()))
    }

    /// Cookies can only be set for the current document's domain, so the origin is
    /// visited once before they are installed. A failed visit leaves the origin pending,
    /// and the next page tries again.
    async fn apply_session(&self, url: &Url, session: &SessionContext) -> Result<(), FetchError> {
        let host = url.host_str().unwrap_or_default();
        let cookies: Vec<_> = session.cookies_for(host).collect();
        if cookies.is_empty() {
            return Ok(());
        }

        let origin = origin_of(url)?;
        let mut applied = self.session_origins.lock().await;
        if applied.contains(&origin) {
            return Ok(());
        }

        let driver = self.driver()?;
        driver
            .goto(origin.as_str())
            .await
            .map_err(|e| session_install_failed(&origin, e))?;

        for session_cookie in &cookies {
            let mut cookie =
                Cookie::new(session_cookie.name.clone(), session_cookie.value.clone());
            if let Some(ref domain) = session_cookie.domain {
                cookie.set_domain(domain.clone());
            }

            if let Err(e) = driver.add_cookie(cookie).await {
                warn!("Skipping cookie {} for {}: {}", session_cookie.name, origin, e);
            }
        }

        info!("Loaded {} session cookies for {}", cookies.len(), origin);
        applied.insert(origin);
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchError> {
        let url = request.url.as_str();
        let page_url = parse_page_url(url)?;

        if let Some(ref session) = request.session {
            self.apply_session(&page_url, session).await?;
        }

        let driver = self.driver()?;
        driver.goto(url).await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let final_url = driver
            .current_url()
            .await
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());

        let html = driver.source().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: format!("failed to read page source: {}", e),
        })?;

        inspect_page(
            url,
            &final_url,
            &html,
            &self.config.session_expired_markers,
            &self.config.blocked_markers,
        )?;

        info!("Rendered {} characters from {}", html.len(), url);
        Ok(html)
    }
}

impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = driver.quit().await {
                            warn!("Failed to quit browser session on drop: {}", e);
                        }
                    });
                }
                Err(_) => warn!("No runtime available to quit browser session"),
            }
        }
    }
}

/// `scheme://host[:port]` of a page URL.
fn origin_of(url: &Url) -> Result<String, FetchError> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(FetchError::Network {
            url: url.to_string(),
            reason: "URL has no origin to install session cookies on".to_string(),
        });
    }
    Ok(origin.ascii_serialization())
}

/// The page is lost, not the run: the driver is still usable.
fn session_install_failed(origin: &str, reason: impl std::fmt::Display) -> FetchError {
    FetchError::Network {
        url: origin.to_string(),
        reason: format!("cannot open origin to install session cookies: {}", reason),
    }
}
