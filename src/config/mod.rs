mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Environment variables that override secrets from the config file.
const ENV_LIBRARY_API_KEY: &str = "REELWATCH_LIBRARY_API_KEY";
const ENV_TELEGRAM_BOT_TOKEN: &str = "REELWATCH_TELEGRAM_BOT_TOKEN";
const ENV_TELEGRAM_CHAT_ID: &str = "REELWATCH_TELEGRAM_CHAT_ID";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./reelwatch.toml",
        "~/.config/reelwatch/config.toml",
        "/etc/reelwatch/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var(ENV_LIBRARY_API_KEY) {
        config.library.api_key = key;
    }
    if let Ok(token) = std::env::var(ENV_TELEGRAM_BOT_TOKEN) {
        config.telegram.bot_token = token;
    }
    if let Ok(chat) = std::env::var(ENV_TELEGRAM_CHAT_ID) {
        config.telegram.chat_id = chat;
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.library.url.trim().is_empty() {
        anyhow::bail!("Library url cannot be empty");
    }

    if config.library.request_timeout_secs == 0 {
        anyhow::bail!("Library request timeout must be at least 1 second");
    }

    if config.reconcile.poll_interval_secs == 0 {
        anyhow::bail!("Reconcile poll interval must be at least 1 second");
    }

    for tracker in &config.trackers {
        if tracker.enabled && tracker.api_key.is_empty() {
            anyhow::bail!("Tracker '{}' is enabled but has no API key", tracker.name);
        }
    }

    if config.telegram.enabled
        && (config.telegram.bot_token.is_empty() || config.telegram.chat_id.is_empty())
    {
        anyhow::bail!("Telegram is enabled but bot_token or chat_id is missing");
    }

    if config.state.notified_max_entries == 0 {
        anyhow::bail!("state.notified_max_entries must be greater than 0");
    }

    Ok(())
}
