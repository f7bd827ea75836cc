use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::Credentials;

pub const DEFAULT_LISTING_URL: &str = "https://canaime.com.br/sgp2rr/areas/impressoes/UND_ChamadaFOTOS_todos2.php?id_und_prisional=PAMC";
pub const DEFAULT_LOGIN_URL: &str = "https://canaime.com.br/sgp2rr/login/login_principal.php";
pub const DEFAULT_PHOTO_BASE_URL: &str = "https://canaime.com.br/sgp2rr/fotos/presos/";

const DEFAULT_REFRESH_MINUTES: u64 = 60;
/// One week.
const MAX_REFRESH_MINUTES: u64 = 7 * 24 * 60;
const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_IDLE_WINDOW_MS: u64 = 500;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Bounds for every point where a refresh waits on the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub navigation: Duration,
    pub login: Duration,
    /// How long the network must stay silent to count as settled.
    pub idle_window: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            login: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
            idle_window: Duration::from_millis(DEFAULT_IDLE_WINDOW_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub listing_url: String,
    pub login_url: String,
    pub photo_base_url: String,
    pub credentials: Credentials,
    pub headless: bool,
    pub javascript_enabled: bool,
    pub chromium_path: Option<PathBuf>,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_credentials: Credentials,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub refresh_interval: Duration,
    pub server: ServerConfig,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("Ignoring unreadable .env file: {}", e),
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys take their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let timeouts = Timeouts {
            navigation: Duration::from_secs(parse_or(
                &lookup,
                "CANAIME_NAVIGATION_TIMEOUT_SECS",
                DEFAULT_NAVIGATION_TIMEOUT_SECS,
            )?),
            login: Duration::from_secs(parse_or(
                &lookup,
                "CANAIME_LOGIN_TIMEOUT_SECS",
                DEFAULT_LOGIN_TIMEOUT_SECS,
            )?),
            idle_window: Duration::from_millis(parse_or(
                &lookup,
                "CANAIME_IDLE_WINDOW_MS",
                DEFAULT_IDLE_WINDOW_MS,
            )?),
        };

        let scraper = ScraperConfig {
            listing_url: string("CANAIME_URL", DEFAULT_LISTING_URL),
            login_url: string("CANAIME_LOGIN_URL", DEFAULT_LOGIN_URL),
            photo_base_url: string("CANAIME_FOTOS_URL", DEFAULT_PHOTO_BASE_URL),
            credentials: Credentials::new(
                string("CANAIME_USER", "usuario"),
                string("CANAIME_PASSWORD", "senha"),
            ),
            headless: parse_bool_or(&lookup, "CANAIME_HEADLESS", true)?,
            javascript_enabled: parse_bool_or(&lookup, "CANAIME_JAVASCRIPT", false)?,
            chromium_path: lookup("CANAIME_CHROMIUM_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            timeouts,
        };

        let minutes: u64 = parse_or(&lookup, "ATUALIZAR_INTERVALO_MINUTOS", DEFAULT_REFRESH_MINUTES)?;
        if minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "ATUALIZAR_INTERVALO_MINUTOS",
                value: "0".into(),
                reason: "interval must be at least one minute".into(),
            });
        }
        let refresh_secs = minutes
            .checked_mul(60)
            .filter(|_| minutes <= MAX_REFRESH_MINUTES)
            .ok_or_else(|| ConfigError::Invalid {
                key: "ATUALIZAR_INTERVALO_MINUTOS",
                value: minutes.to_string(),
                reason: format!("interval must be at most {} minutes", MAX_REFRESH_MINUTES),
            })?;

        let server = ServerConfig {
            host: string("HOST", DEFAULT_HOST),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            api_credentials: Credentials::new(
                string("API_USERNAME", "admin"),
                string("API_PASSWORD", "admin"),
            ),
        };

        log::info!("CANAIME_URL: {}", scraper.listing_url);
        log::info!("CANAIME_LOGIN_URL: {}", scraper.login_url);
        log::info!(
            "CANAIME_USER set: {}",
            if lookup("CANAIME_USER").is_some() { "yes" } else { "no" }
        );
        log::info!(
            "CANAIME_PASSWORD set: {}",
            if lookup("CANAIME_PASSWORD").is_some() { "yes" } else { "no" }
        );

        Ok(Self {
            scraper,
            refresh_interval: Duration::from_secs(refresh_secs),
            server,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: "expected true or false".into(),
            }),
        },
    }
}
