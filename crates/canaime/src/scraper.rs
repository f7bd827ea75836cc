use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;

use crate::auth;
use crate::config::ScraperConfig;
use crate::filter::ResourceFilter;
use crate::network::NetworkMonitor;
use crate::parser::{ParseError, parse_roster};
use crate::refresh::RosterSource;
use crate::types::Entry;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Browser error: {0}")]
    Browser(#[from] CdpError),
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Chromium not found. Install it or set CANAIME_CHROMIUM_PATH")]
    ChromiumNotFound,
    #[error("Login did not complete within {0:?}")]
    Auth(Duration),
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

/// Finds a Chromium binary: the configured path first, then the usual names
/// on `PATH`.
pub fn find_chromium(configured: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.clone());
        }
        log::warn!("Configured Chromium path {} does not exist", path.display());
    }

    ["chromium", "chromium-browser", "google-chrome", "google-chrome-stable"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Navigates `page` to `url`, bounded by `timeout`.
pub(crate) async fn navigate(page: &Page, url: &str, timeout: Duration) -> Result<(), ScraperError> {
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(ScraperError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(ScraperError::Navigation {
            url: url.to_string(),
            reason: format!("timed out after {:?}", timeout),
        }),
    }
}

/// The parts of a browser process needed to shut it down.
#[async_trait]
trait BrowserProcess: Send {
    async fn close(&mut self) -> Result<(), String>;
    async fn wait(&mut self) -> Result<(), String>;
    async fn kill(&mut self) -> Result<(), String>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn close(&mut self) -> Result<(), String> {
        Browser::close(self).await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn wait(&mut self) -> Result<(), String> {
        Browser::wait(self).await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn kill(&mut self) -> Result<(), String> {
        match Browser::kill(self).await {
            Some(result) => result.map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}

async fn kill_browser(browser: &mut impl BrowserProcess) {
    if let Err(e) = browser.kill().await {
        log::warn!("Failed to kill browser process: {}", e);
    }
}

/// Closes the browser and reaps its process, each step bounded by `timeout`.
/// A browser that refuses to close or exit is killed.
async fn shutdown_browser(browser: &mut impl BrowserProcess, timeout: Duration) {
    let closed = match tokio::time::timeout(timeout, browser.close()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::warn!("Failed to close browser: {}", e);
            false
        }
        Err(_) => {
            log::warn!("Browser did not close within {:?}", timeout);
            false
        }
    };
    if !closed {
        kill_browser(browser).await;
    }

    match tokio::time::timeout(timeout, browser.wait()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("Browser process did not exit cleanly: {}", e),
        Err(_) => {
            log::warn!("Browser process still running after {:?}, killing it", timeout);
            kill_browser(browser).await;
        }
    }
}

/// Logs into the portal with a fresh headless browser and scrapes the roster
/// listing. Each call launches and closes its own browser.
#[derive(Debug, Clone)]
pub struct PortalScraper {
    config: ScraperConfig,
}

impl PortalScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub async fn fetch_roster(&self) -> Result<Vec<Entry>, ScraperError> {
        log::info!("Starting roster extraction");

        let chrome_path = find_chromium(self.config.chromium_path.as_ref())
            .ok_or(ScraperError::ChromiumNotFound)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(self.config.timeouts.navigation)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !self.config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(ScraperError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .inspect_err(|e| log::error!("Failed to launch browser: {e:?}"))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser handler error: {}", e);
                }
            }
        });

        let result = self.scrape(&browser).await;

        shutdown_browser(&mut browser, self.config.timeouts.navigation).await;
        handler_task.abort();

        match &result {
            Ok(entries) => log::info!("Extracted {} roster entries", entries.len()),
            Err(e) => log::error!("Roster extraction failed: {}", e),
        }
        result
    }

    async fn scrape(&self, browser: &Browser) -> Result<Vec<Entry>, ScraperError> {
        let page = browser.new_page("about:blank").await?;

        if !self.config.javascript_enabled {
            page.execute(SetScriptExecutionDisabledParams::new(true)).await?;
        }
        let _filter = ResourceFilter::install(&page).await?;
        let monitor = NetworkMonitor::attach(&page).await?;

        auth::login(&page, &monitor, &self.config).await?;

        let url = &self.config.listing_url;
        let timeouts = self.config.timeouts;
        log::info!("Opening roster listing: {}", url);
        navigate(&page, url, timeouts.navigation).await?;
        monitor
            .wait_for_idle(timeouts.idle_window, timeouts.navigation)
            .await
            .map_err(|_| ScraperError::Navigation {
                url: url.clone(),
                reason: format!(
                    "network still busy after {:?} ({} request(s) in flight)",
                    timeouts.navigation,
                    monitor.in_flight()
                ),
            })?;

        let html = page.content().await?;
        log::debug!("Roster page is {} bytes", html.len());

        Ok(parse_roster(&html, &self.config.photo_base_url)?)
    }
}

#[async_trait]
impl RosterSource for PortalScraper {
    async fn fetch_roster(&self) -> Result<Vec<Entry>, ScraperError> {
        PortalScraper::fetch_roster(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_find_chromium_ignores_missing_configured_path() {
        let missing = PathBuf::from("/nonexistent/canaime/chromium");
        let found = find_chromium(Some(&missing));
        assert_ne!(found, Some(missing));
    }

    /// Scripted browser process. `hang_*` steps never complete.
    #[derive(Default)]
    struct FakeBrowser {
        fail_close: bool,
        hang_close: bool,
        hang_wait: bool,
        kills: usize,
    }

    #[async_trait]
    impl BrowserProcess for FakeBrowser {
        async fn close(&mut self) -> Result<(), String> {
            if self.hang_close {
                std::future::pending::<()>().await;
            }
            if self.fail_close {
                return Err("request timed out".into());
            }
            Ok(())
        }

        async fn wait(&mut self) -> Result<(), String> {
            if self.hang_wait && self.kills == 0 {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn kill(&mut self) -> Result<(), String> {
            self.kills += 1;
            Ok(())
        }
    }

    const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn test_clean_shutdown_does_not_kill() {
        let mut browser = FakeBrowser::default();

        shutdown_browser(&mut browser, SHUTDOWN_TIMEOUT).await;

        assert_eq!(browser.kills, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_close_kills_browser() {
        let mut browser = FakeBrowser {
            fail_close: true,
            hang_wait: true,
            ..Default::default()
        };

        shutdown_browser(&mut browser, SHUTDOWN_TIMEOUT).await;

        assert_eq!(browser.kills, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_browser_is_killed_and_shutdown_returns() {
        let mut browser = FakeBrowser {
            hang_close: true,
            ..Default::default()
        };
        let started = tokio::time::Instant::now();

        shutdown_browser(&mut browser, SHUTDOWN_TIMEOUT).await;

        assert_eq!(browser.kills, 1);
        assert!(started.elapsed() >= SHUTDOWN_TIMEOUT);
        assert!(started.elapsed() < SHUTDOWN_TIMEOUT * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_that_never_exits_is_killed() {
        let mut browser = FakeBrowser {
            hang_wait: true,
            ..Default::default()
        };

        shutdown_browser(&mut browser, SHUTDOWN_TIMEOUT).await;

        assert_eq!(browser.kills, 1);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium and access to the portal
    async fn test_fetch_roster_live() {
        let config = Config::from_env().expect("Invalid environment");
        let scraper = PortalScraper::new(config.scraper);

        let entries = scraper.fetch_roster().await.expect("Failed to scrape roster");

        assert!(!entries.is_empty(), "Portal should list at least one entry");
        assert!(entries.iter().all(|e| !e.code.is_empty()));
    }
}
