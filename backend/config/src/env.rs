//! Environment variable overrides for config values.
//!
//! `THUMBFORGE_CACHE_CAPACITY`, `THUMBFORGE_MAX_ATTEMPTS`, `THUMBFORGE_POLL_INTERVAL_MS`
//! and `THUMBFORGE_LOG_LEVEL` take precedence over the file.

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

use crate::schema::{CacheConfig, LoggingConfig, RenderConfig, ThumbforgeConfig};

pub const ENV_CACHE_CAPACITY: &str = "THUMBFORGE_CACHE_CAPACITY";
pub const ENV_MAX_ATTEMPTS: &str = "THUMBFORGE_MAX_ATTEMPTS";
pub const ENV_POLL_INTERVAL_MS: &str = "THUMBFORGE_POLL_INTERVAL_MS";
pub const ENV_LOG_LEVEL: &str = "THUMBFORGE_LOG_LEVEL";

/// An override variable was set but could not be parsed.
#[derive(Debug, Error)]
#[error("Invalid value {value:?} for env var \"{var_name}\"")]
pub struct InvalidEnvVarError {
    pub var_name: String,
    pub value: String,
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: ThumbforgeConfig) -> Result<ThumbforgeConfig, InvalidEnvVarError> {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply overrides from a provided map (useful for testing).
pub fn apply_env_overrides_with(
    mut config: ThumbforgeConfig,
    env: &HashMap<String, String>,
) -> Result<ThumbforgeConfig, InvalidEnvVarError> {
    if let Some(capacity) = parse_var::<usize>(env, ENV_CACHE_CAPACITY)? {
        config.cache.get_or_insert_with(CacheConfig::default).capacity = Some(capacity);
    }
    if let Some(attempts) = parse_var::<u32>(env, ENV_MAX_ATTEMPTS)? {
        config.render.get_or_insert_with(RenderConfig::default).max_attempts = Some(attempts);
    }
    if let Some(ms) = parse_var::<u64>(env, ENV_POLL_INTERVAL_MS)? {
        config.render.get_or_insert_with(RenderConfig::default).poll_interval_ms = Some(ms);
    }
    if let Some(level) = env.get(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
        config.logging.get_or_insert_with(LoggingConfig::default).level = Some(level.clone());
    }
    Ok(config)
}

fn parse_var<T: FromStr>(
    env: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, InvalidEnvVarError> {
    let Some(raw) = env.get(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|_| InvalidEnvVarError {
        var_name: name.to_string(),
        value: raw.clone(),
    })
}
