//! Config defaults: applies sensible default values to parsed config.

use crate::schema::{CacheConfig, LoggingConfig, RenderConfig, ThumbforgeConfig};

/// Default number of video ids held in the render cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default total decode attempts per render.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default readiness poll interval (ms).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

pub const DEFAULT_FFPROBE_PATH: &str = "ffprobe";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: ThumbforgeConfig) -> ThumbforgeConfig {
    let config = apply_cache_defaults(config);
    let config = apply_render_defaults(config);
    apply_logging_defaults(config)
}

fn apply_cache_defaults(mut config: ThumbforgeConfig) -> ThumbforgeConfig {
    let cache = config.cache.get_or_insert_with(CacheConfig::default);
    if cache.capacity.is_none() {
        cache.capacity = Some(DEFAULT_CACHE_CAPACITY);
    }
    config
}

/// Ensure retry ceiling and poll interval are set.
fn apply_render_defaults(mut config: ThumbforgeConfig) -> ThumbforgeConfig {
    let render = config.render.get_or_insert_with(RenderConfig::default);
    if render.max_attempts.is_none() {
        render.max_attempts = Some(DEFAULT_MAX_ATTEMPTS);
    }
    if render.poll_interval_ms.is_none() {
        render.poll_interval_ms = Some(DEFAULT_POLL_INTERVAL_MS);
    }
    if render.retain_decode_handle.is_none() {
        render.retain_decode_handle = Some(false);
    }
    config
}

fn apply_logging_defaults(mut config: ThumbforgeConfig) -> ThumbforgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    if logging.json.is_none() {
        logging.json = Some(false);
    }
    config
}
