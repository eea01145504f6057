//! Estimated task durations.
//!
//! Estimates arrive either as whole minutes or as free text typed by the
//! user ("2h", "30m", "1.5h"). Every consumer converts them through
//! [`minutes_or_default`] so scheduling math matches what the UI shows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minutes assumed when an estimate is missing or unreadable.
pub const DEFAULT_ESTIMATE_MINUTES: u32 = 30;

/// A task's estimated duration as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EstimatedTime {
    Minutes(i64),
    Text(String),
}

impl EstimatedTime {
    /// Duration in whole minutes. Never fails; unreadable text yields the default.
    pub fn minutes(&self) -> u32 {
        match self {
            EstimatedTime::Minutes(value) => (*value).clamp(0, u32::MAX as i64) as u32,
            EstimatedTime::Text(text) => parse_minutes(text),
        }
    }
}

impl fmt::Display for EstimatedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatedTime::Minutes(value) => write!(f, "{value}m"),
            EstimatedTime::Text(text) => f.write_str(text),
        }
    }
}

impl From<u32> for EstimatedTime {
    fn from(value: u32) -> Self {
        EstimatedTime::Minutes(value as i64)
    }
}

impl From<&str> for EstimatedTime {
    fn from(value: &str) -> Self {
        EstimatedTime::Text(value.to_string())
    }
}

/// Minutes for an optional estimate, defaulting absent values.
pub fn minutes_or_default(estimate: Option<&EstimatedTime>) -> u32 {
    estimate
        .map(EstimatedTime::minutes)
        .unwrap_or(DEFAULT_ESTIMATE_MINUTES)
}

/// Parse a free-text estimate.
///
/// Takes the leading number (digits with at most one decimal point). If the
/// text contains `h` the number is hours, otherwise minutes. Text without a
/// leading number parses as [`DEFAULT_ESTIMATE_MINUTES`].
pub fn parse_minutes(text: &str) -> u32 {
    let trimmed = text.trim();
    let Some(value) = leading_number(trimmed) else {
        return DEFAULT_ESTIMATE_MINUTES;
    };

    let lower = trimmed.to_ascii_lowercase();
    let minutes = if lower.contains('h') {
        (value * 60.0).round()
    } else {
        value.round()
    };

    if minutes >= u32::MAX as f64 {
        u32::MAX
    } else {
        minutes as u32
    }
}

fn leading_number(text: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_ascii_digit() {
            end = idx + 1;
        } else if ch == '.' && !seen_dot {
            seen_dot = true;
            end = idx + 1;
        } else {
            break;
        }
    }

    let token = text[..end].trim_end_matches('.');
    if !token.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<f64>().ok()
}
