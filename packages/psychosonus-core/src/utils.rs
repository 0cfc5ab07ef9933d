//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol_constants::UNKNOWN_DURATION;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Formats a track length in seconds as `mm:ss`.
///
/// Search backends report durations as integers, floats or not at all.
/// Missing, zero, negative and non-finite values all format as `Unknown`.
#[must_use]
pub fn format_duration_secs(secs: Option<f64>) -> String {
    match secs {
        Some(s) if s.is_finite() && s > 0.0 => {
            let total = s as u64;
            format!("{:02}:{:02}", total / 60, total % 60)
        }
        _ => UNKNOWN_DURATION.to_string(),
    }
}

/// Formats a track length in milliseconds as `mm:ss`.
#[must_use]
pub fn format_duration_millis(millis: u64) -> String {
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1000;
    format!("{:02}:{:02}", minutes, seconds)
}

// ─────────────────────────────────────────────────────────────────────────────
// String Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Truncates a string to at most `max_chars` characters.
///
/// Counts `char`s rather than bytes so multi-byte titles are never split
/// mid-codepoint.
#[must_use]
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn format_duration_secs_pads_minutes_and_seconds() {
        assert_eq!(format_duration_secs(Some(65.0)), "01:05");
        assert_eq!(format_duration_secs(Some(3599.0)), "59:59");
    }

    #[test]
    fn format_duration_secs_truncates_fractional_seconds() {
        assert_eq!(format_duration_secs(Some(212.74)), "03:32");
    }

    #[test]
    fn format_duration_secs_handles_missing_and_zero() {
        assert_eq!(format_duration_secs(None), "Unknown");
        assert_eq!(format_duration_secs(Some(0.0)), "Unknown");
        assert_eq!(format_duration_secs(Some(f64::NAN)), "Unknown");
    }

    #[test]
    fn format_duration_secs_allows_hours_in_minutes_field() {
        assert_eq!(format_duration_secs(Some(3725.0)), "62:05");
    }

    #[test]
    fn format_duration_millis_drops_remainder() {
        assert_eq!(format_duration_millis(215_999), "03:35");
        assert_eq!(format_duration_millis(0), "00:00");
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 5), "");
    }
}
