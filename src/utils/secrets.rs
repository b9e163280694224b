//! Startup checks for configured secrets.

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::config::Config;

const MIN_SECRET_LENGTH: usize = 16;

/// Validate secrets before the server starts accepting deliveries.
///
/// Short secrets are refused in production and only warned about elsewhere.
pub fn validate_secrets(config: &Config) -> Result<()> {
    let secrets = [
        ("SHOTGUN_WEBHOOK_SECRET", config.webhook_secret.as_str()),
        ("SHOTGUN_WEBHOOK_SCRIPT_KEY", config.shotgrid.script_key.as_str()),
    ];

    for (name, value) in secrets {
        if value.trim() != value {
            warn!("{} has leading or trailing whitespace", name);
        }

        if value.len() < MIN_SECRET_LENGTH {
            if config.is_production() {
                bail!(
                    "{} must be at least {} characters in production",
                    name,
                    MIN_SECRET_LENGTH
                );
            }
            warn!(
                "⚠️  {} is shorter than {} characters - acceptable for development only",
                name, MIN_SECRET_LENGTH
            );
        }
    }

    info!("✅ Secrets validated");
    Ok(())
}
