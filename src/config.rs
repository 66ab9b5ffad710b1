//! Environment-driven configuration.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default base URL for the holoplus API.
pub const DEFAULT_API_BASE: &str = "https://api.holoplus.com";

/// holoplus API credential and endpoint.
#[derive(Debug)]
pub struct HoloplusConfig {
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: SecretString,
}

impl HoloplusConfig {
    /// Build config from environment variables.
    ///
    /// `HOLOPLUS_TOKEN` is required. `HOLOPLUS_API_BASE` overrides the API
    /// base URL (useful for proxies and tests).
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = read_required("HOLOPLUS_TOKEN", "Set it to a holoplus Bearer token.")?;
        let base_url = std::env::var("HOLOPLUS_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            token: SecretString::from(token),
        })
    }
}

/// Discord webhook endpoint.
#[derive(Debug)]
pub struct NotifyConfig {
    /// Webhook URL. Treated as a secret: it embeds the webhook token.
    pub webhook_url: SecretString,
}

impl NotifyConfig {
    /// Build config from environment variables.
    ///
    /// `DISCORD_WEBHOOK_URL` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = read_required("DISCORD_WEBHOOK_URL", "Set it to a Discord webhook URL.")?;
        Ok(Self {
            webhook_url: SecretString::from(url),
        })
    }
}

/// Locations of the three snapshot files shared between subcommands.
#[derive(Debug, Clone)]
pub struct StorePaths {
    /// Channel snapshot, written by `channels`, read by `harvest`.
    pub channels: PathBuf,
    /// Full merged harvest, written and read by `harvest`.
    pub harvest: PathBuf,
    /// New-since-last-run subset, written by `harvest`, read by `notify`.
    pub new_items: PathBuf,
}

impl StorePaths {
    /// Snapshot files under the given directory.
    pub fn rooted(dir: &Path) -> Self {
        Self {
            channels: dir.join("talent-channel.json"),
            harvest: dir.join("talent-channel-newest.json"),
            new_items: dir.join("new.json"),
        }
    }

    /// Root the snapshot files at `HOLOWATCH_DATA_DIR` (default: current
    /// directory).
    pub fn from_env() -> Self {
        let dir = std::env::var("HOLOWATCH_DATA_DIR").unwrap_or_else(|_| ".".to_string());
        Self::rooted(Path::new(&dir))
    }
}

/// Read a required environment variable. Empty counts as missing.
fn read_required(key: &str, hint: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingRequired {
            key: key.to_string(),
            hint: hint.to_string(),
        }),
    }
}
