//! Client configuration loader.
//!
//! Reads a JSON file into [`WsClientConfig`], applies environment overrides
//! and validates the result. A missing file yields the defaults.

use moodle_ws_types::{ConfigError, WsClientConfig};
use std::fs;
use std::path::Path;
use validator::Validate;

pub const ENV_TIMEOUT: &str = "MOODLE_WS_TIMEOUT";
pub const ENV_TIMEOUT_WIFI: &str = "MOODLE_WS_TIMEOUT_WIFI";
pub const ENV_MAX_RETRIES: &str = "MOODLE_WS_MAX_RETRIES";
pub const ENV_USER_AGENT: &str = "MOODLE_WS_USER_AGENT";

/// Load the client configuration from `path` and the process environment.
pub fn load_config(path: &Path) -> Result<WsClientConfig, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with_env<F>(path: &Path, env: F) -> Result<WsClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::from_io_error(path, &e))?;
        serde_json::from_str::<WsClientConfig>(&content).map_err(|e| ConfigError::from_json_error(&e))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        WsClientConfig::default()
    };

    apply_env_overrides(&mut config, env)?;
    config.validate().map_err(|e| ConfigError::from_validation(&e))?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut WsClientConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env(ENV_TIMEOUT) {
        config.ws_timeout_secs = parse_number(ENV_TIMEOUT, &value)?;
    }
    if let Some(value) = env(ENV_TIMEOUT_WIFI) {
        config.ws_timeout_wifi_secs = parse_number(ENV_TIMEOUT_WIFI, &value)?;
    }
    if let Some(value) = env(ENV_MAX_RETRIES) {
        // "none" lifts the cap.
        config.max_retry_attempts = if value.trim().eq_ignore_ascii_case("none") {
            None
        } else {
            Some(parse_number(ENV_MAX_RETRIES, &value)?)
        };
    }
    if let Some(value) = env(ENV_USER_AGENT) {
        config.user_agent = value;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::ValidationError {
        field: name.to_string(),
        message: format!("expected a non-negative integer, got {value:?}"),
    })
}
