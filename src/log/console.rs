//! Terminal implementation of [`RunLog`].

use console::Term;

use super::theme::LogTheme;
use super::{RunLog, UnitKind};
use crate::runner::StatusType;

/// Writes run progress to the terminal.
///
/// Progress and step output go to stdout; warnings and errors go to stderr.
/// In quiet mode only warnings and errors are written.
pub struct ConsoleLog {
    out: Term,
    err: Term,
    theme: LogTheme,
    quiet: bool,
}

impl ConsoleLog {
    /// Create a console log, colored when the terminal supports it.
    pub fn new(quiet: bool, colors: bool) -> Self {
        let theme = if colors {
            LogTheme::new()
        } else {
            LogTheme::plain()
        };
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            theme,
            quiet,
        }
    }

    fn write_out(&self, line: &str) {
        if !self.quiet {
            // Terminal write failures are not worth aborting a run for.
            let _ = self.out.write_line(line);
        }
    }

    fn write_err(&self, line: &str) {
        let _ = self.err.write_line(line);
    }
}

impl RunLog for ConsoleLog {
    fn info(&mut self, msg: &str) {
        self.write_out(msg);
    }

    fn warn(&mut self, msg: &str) {
        self.write_err(&format!("{}", self.theme.warning.apply_to(msg)));
    }

    fn error(&mut self, msg: &str) {
        self.write_err(&format!("{}", self.theme.error.apply_to(msg)));
    }

    fn output(&mut self, line: &str) {
        self.write_out(&format!("    {}", self.theme.dim.apply_to(line)));
    }

    fn start(&mut self, unit: UnitKind, index: usize, total: usize, name: &str) {
        let counter = self.theme.format_counter(index, total);
        let line = match unit {
            UnitKind::Stage => format!(
                "{} {}",
                counter,
                self.theme.header.apply_to(format!("Stage {}", name))
            ),
            UnitKind::Job => format!(
                "  {} {}",
                counter,
                self.theme.title.apply_to(format!("Job {}", name))
            ),
            UnitKind::Step => format!("    {} {}", counter, name),
        };
        self.write_out(&line);
    }

    fn finish(&mut self, unit: UnitKind, name: &str, status: StatusType) {
        let indent = match unit {
            UnitKind::Stage => "",
            UnitKind::Job => "  ",
            UnitKind::Step => "    ",
        };
        let line = format!(
            "{}{}",
            indent,
            self.theme
                .format_status(status, &format!("{} {}: {}", unit, name, status))
        );
        if status == StatusType::Error && self.quiet {
            self.write_err(&line);
        } else {
            self.write_out(&line);
        }
    }
}
