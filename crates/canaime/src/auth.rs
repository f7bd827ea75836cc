//! Portal login.
//!
//! There is no reliable success marker on the page that follows the login
//! form, so a login counts as complete once the network goes quiet. A
//! rejected password looks the same from here; it only shows up later as an
//! empty roster.

use std::fmt::Debug;

use chromiumoxide::page::Page;

use crate::config::{ScraperConfig, Timeouts};
use crate::network::NetworkMonitor;
use crate::scraper::{ScraperError, navigate};

pub const USERNAME_FIELD: &str = r#"input[name="usuario"]"#;
pub const PASSWORD_FIELD: &str = r#"input[name="senha"]"#;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens the login page, fills the form and submits it, then waits for the
/// portal to settle. Fails with [`ScraperError::Auth`] when it does not settle
/// within the login timeout.
pub async fn login(
    page: &Page,
    monitor: &NetworkMonitor,
    config: &ScraperConfig,
) -> Result<(), ScraperError> {
    log::info!("Opening login page: {}", config.login_url);
    navigate(page, &config.login_url, config.timeouts.navigation).await?;

    log::info!("Submitting login form");
    let timeout = config.timeouts.login;
    tokio::time::timeout(timeout, submit_form(page, &config.credentials))
        .await
        .map_err(|_| ScraperError::Auth(timeout))??;

    wait_for_login(monitor, &config.timeouts).await?;

    log::info!("Login settled");
    Ok(())
}

/// Waits for the post-submit traffic to die down, bounded by the login
/// timeout.
pub(crate) async fn wait_for_login(
    monitor: &NetworkMonitor,
    timeouts: &Timeouts,
) -> Result<(), ScraperError> {
    monitor
        .wait_for_idle(timeouts.idle_window, timeouts.login)
        .await
        .map_err(|_| {
            log::error!(
                "Login did not settle, {} request(s) still in flight",
                monitor.in_flight()
            );
            ScraperError::Auth(timeouts.login)
        })
}

async fn submit_form(page: &Page, credentials: &Credentials) -> Result<(), ScraperError> {
    let username = page.find_element(USERNAME_FIELD).await?;
    username.click().await?;
    username.type_str(&credentials.username).await?;
    username.press_key("Tab").await?;

    let password = page.find_element(PASSWORD_FIELD).await?;
    password.type_str(&credentials.password).await?;
    password.press_key("Enter").await?;
    Ok(())
}
