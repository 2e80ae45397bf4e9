//! Configuration loading: config file discovery and the bot token.

pub use circlecast_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./circlecast.toml",
        "./config.toml",
        "~/.config/circlecast/config.toml",
        "/etc/circlecast/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    tracing::debug!("No config file found; using defaults");
    Ok(Config::default())
}

/// Read the bot token from [`TOKEN_ENV`].
///
/// A missing or blank token is fatal at startup.
pub fn load_token() -> Result<BotToken> {
    token_from_var(TOKEN_ENV)
}

fn token_from_var(name: &str) -> Result<BotToken> {
    let raw = std::env::var(name)
        .with_context(|| format!("{name} is not set; export the bot token before starting"))?;
    let token = BotToken::new(raw).with_context(|| format!("{name} is empty"))?;
    Ok(token)
}
