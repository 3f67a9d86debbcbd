//! Runtime configuration for the thumbnail renderer.
//!
//! Provides:
//! - Typed config schema (cache, render, logging, ffmpeg)
//! - YAML read/write
//! - `THUMBFORGE_*` environment overrides
//! - Default value application
//! - Schema validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, apply_env_overrides_with, InvalidEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use schema::ThumbforgeConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Load, apply env overrides and defaults, and validate a config file.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<ThumbforgeConfig> {
    let config = load_config(path).await?;
    let config = apply_env_overrides(config).context("Failed to apply env overrides")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!("Config at {} has {} error(s)", path.display(), report.errors.len());
    }

    Ok(config)
}
