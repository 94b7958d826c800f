//! CLI argument validators.
//!
//! Shared validation functions for CLI argument parsing.

use chrono::NaiveDate;
use std::time::Duration;

/// Parse and validate confidence value (0.0-1.0).
pub fn parse_confidence(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(0.0..=1.0).contains(&value) {
        return Err(format!(
            "confidence must be between 0.0 and 1.0, got {value}"
        ));
    }

    Ok(value)
}

/// Parse and validate a bounded float value.
///
/// # Arguments
///
/// * `s` - The string to parse
/// * `min` - Minimum allowed value (exclusive)
/// * `max` - Maximum allowed value (inclusive)
/// * `name` - Name of the parameter for error messages
pub fn parse_bounded_float(s: &str, min: f64, max: f64, name: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(value > min && value <= max) {
        return Err(format!(
            "{name} must be greater than {min} and at most {max}, got {value}"
        ));
    }

    Ok(value)
}

/// Parse a correlation window in seconds.
pub fn parse_window(s: &str) -> Result<f64, String> {
    parse_bounded_float(
        s,
        0.0,
        crate::constants::MAX_CORRELATION_WINDOW_SECS,
        "window",
    )
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    crate::utils::date::parse_date(s).ok_or_else(|| format!("'{s}' is not a YYYY-MM-DD date"))
}

/// Parse a duration like `90s`, `30m`, `2h` or `1d`; bare numbers are seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("'{s}' is not a valid duration"))?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(format!("unknown duration unit '{unit}' (use s, m, h or d)")),
    };

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
