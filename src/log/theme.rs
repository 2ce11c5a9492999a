//! Visual theme and styling.

use console::Style;
use std::time::Duration;

use crate::runner::StatusType;

/// Styles used by the console log.
#[derive(Debug, Clone)]
pub struct LogTheme {
    /// Style for success messages (green).
    pub success: Style,
    /// Style for warning messages (orange).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    /// Style for dim/secondary text.
    pub dim: Style,
    /// Style for stage headers (magenta bold).
    pub header: Style,
    /// Style for job titles (bold).
    pub title: Style,
    /// Style for `[n/m]` counters (dim).
    pub counter: Style,
}

impl Default for LogTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl LogTheme {
    /// Create the default colored theme.
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            dim: Style::new().dim(),
            header: Style::new().bold().magenta(),
            title: Style::new().bold(),
            counter: Style::new().dim(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            dim: Style::new(),
            header: Style::new(),
            title: Style::new(),
            counter: Style::new(),
        }
    }

    /// Format a terminal status with its icon.
    pub fn format_status(&self, status: StatusType, msg: &str) -> String {
        match status {
            StatusType::Complete => format!("{}", self.success.apply_to(format!("✓ {}", msg))),
            StatusType::Warning => format!("{}", self.warning.apply_to(format!("⚠ {}", msg))),
            StatusType::Error => format!("{}", self.error.apply_to(format!("✗ {}", msg))),
            StatusType::Skipped => format!("{}", self.dim.apply_to(format!("○ {}", msg))),
            StatusType::Init | StatusType::InProgress => {
                format!("{}", self.dim.apply_to(format!("… {}", msg)))
            }
        }
    }

    /// Format a `[n/m]` counter.
    pub fn format_counter(&self, index: usize, total: usize) -> String {
        format!(
            "{}",
            self.counter.apply_to(format!("[{}/{}]", index + 1, total))
        )
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    console::Term::stdout().is_term()
}

/// Format a duration as a short human-readable string.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_icons() {
        let theme = LogTheme::plain();
        assert_eq!(theme.format_status(StatusType::Complete, "build"), "✓ build");
        assert_eq!(theme.format_status(StatusType::Warning, "build"), "⚠ build");
        assert_eq!(theme.format_status(StatusType::Error, "build"), "✗ build");
        assert_eq!(theme.format_status(StatusType::Skipped, "build"), "○ build");
    }

    #[test]
    fn counter_is_one_based() {
        assert_eq!(LogTheme::plain().format_counter(0, 3), "[1/3]");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }
}
