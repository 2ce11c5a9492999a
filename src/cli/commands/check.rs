//! Check command implementation.
//!
//! The `conveyor check` command validates a pipeline without running it.

use std::io::Write;

use crate::cli::args::CheckArgs;
use crate::error::Result;
use crate::pipeline::{validate, Severity};

use super::dispatcher::{Command, CommandResult, GlobalOptions, EXIT_FAILURE};

/// The check command implementation.
pub struct CheckCommand {
    options: GlobalOptions,
    args: CheckArgs,
}

impl CheckCommand {
    pub fn new(options: GlobalOptions, args: CheckArgs) -> Self {
        Self { options, args }
    }
}

impl Command for CheckCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let (pipeline, _) = self.options.load(&self.args.file)?;
        let diagnostics = validate(&pipeline);
        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();

        if self.args.json {
            let json = serde_json::to_string_pretty(&diagnostics).map_err(anyhow::Error::from)?;
            writeln!(out, "{}", json)?;
        } else {
            for diagnostic in &diagnostics {
                writeln!(out, "{}", diagnostic)?;
            }
            if !self.options.quiet {
                let warnings = diagnostics.len() - errors;
                if diagnostics.is_empty() {
                    writeln!(out, "{} is valid", self.args.file.display())?;
                } else {
                    writeln!(out, "{} error(s), {} warning(s)", errors, warnings)?;
                }
            }
        }

        if errors > 0 {
            Ok(CommandResult::failure(EXIT_FAILURE))
        } else {
            Ok(CommandResult::success())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn check(yaml: &str, json: bool) -> (CommandResult, String) {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("p.yml"), yaml).unwrap();
        let options = GlobalOptions {
            work_dir: temp.path().to_path_buf(),
            ..Default::default()
        };
        let args = CheckArgs {
            file: PathBuf::from("p.yml"),
            json,
        };
        let mut out = Vec::new();
        let result = CheckCommand::new(options, args).execute(&mut out).unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn valid_pipeline_passes() {
        let (result, out) = check("steps:\n  - script: echo hi\n", false);
        assert!(result.success);
        assert!(out.contains("is valid"));
    }

    #[test]
    fn cycle_fails() {
        let yaml = r#"
jobs:
  - job: a
    dependsOn: b
    steps:
      - script: echo a
  - job: b
    dependsOn: a
    steps:
      - script: echo b
"#;
        let (result, out) = check(yaml, false);
        assert_eq!(result.exit_code, EXIT_FAILURE);
        assert!(out.contains("a -> b -> a") || out.contains("b -> a -> b"));
    }

    #[test]
    fn json_lists_diagnostics() {
        let yaml = r#"
jobs:
  - job: deploy
    dependsOn: build
    steps:
      - script: echo deploy
"#;
        let (result, out) = check(yaml, true);
        assert!(!result.success);
        let diagnostics: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(diagnostics.as_array().is_some_and(|d| !d.is_empty()));
    }
}
