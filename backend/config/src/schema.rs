//! Thumbforge runtime configuration schema.
//!
//! Every section is optional in the file; unset fields are filled by
//! [`crate::apply_all_defaults`] and read back through the typed accessors.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::defaults::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_FFMPEG_PATH, DEFAULT_FFPROBE_PATH, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbforgeConfig {
    /// Render cache sizing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    /// Frame renderer retry and polling behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// External ffmpeg tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<FfmpegConfig>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum number of video ids kept in the render cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    /// Total decode attempts before a render is abandoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Delay between readiness polls while a decode settles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Keep decode sessions alive after rendering so later timestamps can seek.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_decode_handle: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Directory for rolling NDJSON logs. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Emit console logs as JSON lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Typed accessors
// ---------------------------------------------------------------------------

impl ThumbforgeConfig {
    pub fn cache_capacity(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.capacity)
            .unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    pub fn max_attempts(&self) -> u32 {
        self.render
            .as_ref()
            .and_then(|r| r.max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn poll_interval(&self) -> Duration {
        let ms = self
            .render
            .as_ref()
            .and_then(|r| r.poll_interval_ms)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    pub fn retain_decode_handle(&self) -> bool {
        self.render
            .as_ref()
            .and_then(|r| r.retain_decode_handle)
            .unwrap_or(false)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.dir.as_deref())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    pub fn ffmpeg_path(&self) -> &str {
        self.ffmpeg
            .as_ref()
            .and_then(|f| f.ffmpeg_path.as_deref())
            .unwrap_or(DEFAULT_FFMPEG_PATH)
    }

    pub fn ffprobe_path(&self) -> &str {
        self.ffmpeg
            .as_ref()
            .and_then(|f| f.ffprobe_path.as_deref())
            .unwrap_or(DEFAULT_FFPROBE_PATH)
    }
}
