//! Config validation: schema checks with user-friendly error messages.

use crate::schema::ThumbforgeConfig;
use thiserror::Error;

/// Poll intervals below this are accepted but flagged.
const MIN_SENSIBLE_POLL_INTERVAL_MS: u64 = 5;

/// Retry ceilings above this are accepted but flagged.
const MAX_SENSIBLE_ATTEMPTS: u32 = 20;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &ThumbforgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_cache(config, &mut report);
    validate_render(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_cache(config: &ThumbforgeConfig, report: &mut ValidationReport) {
    let Some(cache) = &config.cache else { return };
    if cache.capacity == Some(0) {
        report.error("cache.capacity", "Capacity must be at least 1 video");
    }
}

fn validate_render(config: &ThumbforgeConfig, report: &mut ValidationReport) {
    let Some(render) = &config.render else { return };
    match render.max_attempts {
        Some(0) => report.error("render.maxAttempts", "At least one decode attempt is required"),
        Some(n) if n > MAX_SENSIBLE_ATTEMPTS => report.warn(
            "render.maxAttempts",
            format!("{n} attempts may keep failing streams busy for a long time"),
        ),
        _ => {}
    }
    match render.poll_interval_ms {
        Some(0) => report.error("render.pollIntervalMs", "Poll interval must be positive"),
        Some(ms) if ms < MIN_SENSIBLE_POLL_INTERVAL_MS => report.warn(
            "render.pollIntervalMs",
            format!("{ms}ms polling will spin while decodes settle"),
        ),
        _ => {}
    }
}

fn validate_logging(config: &ThumbforgeConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        // Directive strings like "thumbforge_render=debug" are passed to EnvFilter untouched.
        if !level.contains('=') && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            report.warn("logging.level", format!("Unknown log level \"{level}\""));
        }
    }
}
