//! Progress spinners for event ingestion.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner counting events read from one source.
pub fn create_stream_progress(
    multi: &MultiProgress,
    label: &str,
    enabled: bool,
) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] {label:>6}: {{pos}} events {{msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(multi.add(pb))
}

/// Finish a progress bar with a message.
pub fn finish_progress(pb: Option<&ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(message.to_string());
    }
}

/// Increment a progress bar.
pub fn inc_progress(pb: Option<&ProgressBar>) {
    if let Some(pb) = pb {
        pb.inc(1);
    }
}

/// Format a duration in seconds as `1h 2m 3s`, `2m 3s` or `3.4s`.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = secs.round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_is_none() {
        let multi = MultiProgress::new();
        assert!(create_stream_progress(&multi, "visual", false).is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3.44), "3.4s");
        assert_eq!(format_duration(123.0), "2m 3s");
        assert_eq!(format_duration(3723.0), "1h 2m 3s");
    }
}
