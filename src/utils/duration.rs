// HH:MM:SS formatting and parsing for whole-second durations

use regex::Regex;
use std::sync::OnceLock;

fn loose_hms() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only; up to three groups of 0-2 digits, each optionally colon-terminated
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]{0,2}:?){0,3}$").expect("time pattern is valid"))
}

/// Format seconds as "HH:MM:SS" (each field zero-padded to two digits)
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Parse "H:M:S" text into seconds
///
/// Accepts up to three groups of 0-2 digits, each optionally followed by a
/// colon. Fields read as hours, minutes, seconds; missing or empty fields
/// count as zero. Returns None for anything else so the caller can keep
/// its previous value.
pub fn parse_hms(text: &str) -> Option<u64> {
    if !loose_hms().is_match(text) {
        return None;
    }

    let mut fields = text.split(':').map(|field| {
        if field.is_empty() {
            Some(0u64)
        } else {
            field.parse::<u64>().ok()
        }
    });

    let hours = fields.next().flatten().unwrap_or(0);
    let minutes = fields.next().flatten().unwrap_or(0);
    let secs = fields.next().flatten().unwrap_or(0);

    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(secs)
}

/// Fractional hours with one decimal place (e.g. 5400 -> "1.5")
pub fn format_hours(seconds: f64) -> String {
    format!("{:.1}", seconds / 3600.0)
}

/// Hours rounded to one decimal place
pub fn round_hours(seconds: u64) -> f64 {
    (seconds as f64 / 3600.0 * 10.0).round() / 10.0
}
