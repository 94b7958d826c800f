//! Configuration validation.

use crate::config::{Config, CorrelationConfig, ExportConfig, StorageConfig};
use crate::constants::{MAX_CORRELATION_WINDOW_SECS, confidence};
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_correlation(&config.correlation)?;
    validate_storage(&config.storage)?;
    validate_export(&config.export)?;
    Ok(())
}

fn invalid(message: String) -> Error {
    Error::ConfigValidation { message }
}

fn check_confidence(name: &str, value: f32) -> Result<()> {
    if !(confidence::MIN..=confidence::MAX).contains(&value) {
        return Err(invalid(format!(
            "{name} must be between {} and {}, got {value}",
            confidence::MIN,
            confidence::MAX
        )));
    }
    Ok(())
}

/// Validate correlation engine settings.
pub fn validate_correlation(config: &CorrelationConfig) -> Result<()> {
    // NaN fails the range check too
    if !(config.window_seconds > 0.0 && config.window_seconds <= MAX_CORRELATION_WINDOW_SECS) {
        return Err(invalid(format!(
            "window_seconds must be in (0, {MAX_CORRELATION_WINDOW_SECS}], got {}",
            config.window_seconds
        )));
    }

    check_confidence("audio_min_confidence", config.audio_min_confidence)?;
    check_confidence(
        "visual_confidence_threshold",
        config.visual_confidence_threshold,
    )?;

    if config.max_window_entries == 0 {
        return Err(invalid("max_window_entries must be at least 1".to_string()));
    }

    Ok(())
}

/// Validate persistence settings.
pub fn validate_storage(config: &StorageConfig) -> Result<()> {
    if config.retry_attempts == 0 {
        return Err(invalid("retry_attempts must be at least 1".to_string()));
    }

    if config.retry_base_delay_ms > config.retry_max_delay_ms {
        return Err(invalid(format!(
            "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
            config.retry_base_delay_ms, config.retry_max_delay_ms
        )));
    }

    if config.retention_days == Some(0) {
        return Err(invalid("retention_days must be at least 1".to_string()));
    }

    Ok(())
}

/// Validate eBird export settings.
pub fn validate_export(config: &ExportConfig) -> Result<()> {
    if !(-90.0..=90.0).contains(&config.latitude) {
        return Err(invalid(format!(
            "latitude must be between -90 and 90, got {}",
            config.latitude
        )));
    }

    if !(-180.0..=180.0).contains(&config.longitude) {
        return Err(invalid(format!(
            "longitude must be between -180 and 180, got {}",
            config.longitude
        )));
    }

    if config.location_name.trim().is_empty() {
        return Err(invalid("location_name must not be empty".to_string()));
    }

    Ok(())
}
