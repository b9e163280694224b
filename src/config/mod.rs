use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub mod toolkit;
pub use toolkit::ToolkitConfig;

/// Environment name that hides the interactive API docs.
pub const PRODUCTION_ENVIRONMENT: &str = "production";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process-wide configuration, loaded once at startup and never mutated.
#[derive(Clone)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
    pub webhook_secret: String,
    pub shotgrid: ShotgridConfig,
    pub toolkit: ToolkitConfig,
}

/// Tracking-site connection and script-user credentials.
#[derive(Clone)]
pub struct ShotgridConfig {
    pub site: String,
    pub script_name: String,
    pub script_key: String,
    pub http_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .field("webhook_secret", &"<redacted>")
            .field("shotgrid", &self.shotgrid)
            .field("toolkit", &self.toolkit)
            .finish()
    }
}

impl fmt::Debug for ShotgridConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShotgridConfig")
            .field("site", &self.site)
            .field("script_name", &self.script_name)
            .field("script_key", &"<redacted>")
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let site = required("SHOTGUN_SITE")?;
        let site = site.trim_end_matches('/').to_string();
        if !site.starts_with("http://") && !site.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "SHOTGUN_SITE",
                value: site,
            });
        }

        Ok(Config {
            environment: required("ENVIRONMENT")?,
            port: parse_or("PORT", lookup("PORT"), 8000)?,
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT",
                lookup("REQUEST_TIMEOUT"),
                30,
            )?),
            body_limit_bytes: parse_or(
                "WEBHOOK_BODY_LIMIT_BYTES",
                lookup("WEBHOOK_BODY_LIMIT_BYTES"),
                1024 * 1024,
            )?,
            webhook_secret: required("SHOTGUN_WEBHOOK_SECRET")?,
            shotgrid: ShotgridConfig {
                site,
                script_name: required("SHOTGUN_WEBHOOK_SCRIPT_USER")?,
                script_key: required("SHOTGUN_WEBHOOK_SCRIPT_KEY")?,
                http_timeout: Duration::from_secs(parse_or(
                    "SHOTGUN_HTTP_TIMEOUT",
                    lookup("SHOTGUN_HTTP_TIMEOUT"),
                    30,
                )?),
            },
            toolkit: ToolkitConfig::from_lookup(&lookup),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
    }

    pub fn docs_enabled(&self) -> bool {
        !self.is_production()
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => {
            warn!("{} is set but empty, using default", key);
            Ok(default)
        }
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
