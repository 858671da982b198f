//! Output formatting utilities

use chrono::{DateTime, Local, Utc};
use colored::*;
use svcctl_engine::domain::OperationStatus;

/// Format a timestamp in local time
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format run state with appropriate color
pub fn format_state(running: bool) -> ColoredString {
    if running {
        "running".green()
    } else {
        "stopped".yellow()
    }
}

pub fn format_status(status: OperationStatus) -> ColoredString {
    match status {
        OperationStatus::Success => "success".green(),
        OperationStatus::Failed => "failed".red(),
    }
}

pub fn format_optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Cut `value` to at most `max` characters, marking the cut with "..."
pub fn truncate(value: &str, max: usize) -> String {
    let single_line = value.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let kept: String = single_line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long command line", 10), "a long ...");
        assert_eq!(truncate("two\nlines", 20), "two lines");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(Some(42)), "42");
        assert_eq!(format_optional::<u32>(None), "-");
    }
}
