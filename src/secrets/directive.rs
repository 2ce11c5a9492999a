//! Parsing of the publish-variable directive steps write to their output.
//!
//! A step publishes a variable by printing a line of the form
//!
//! ```text
//! ##vso[task.setvariable variable=Name;isSecret=true]value
//! ```
//!
//! Property keys are case-insensitive and `name=` is accepted as an alias for
//! `variable=`. A missing `isSecret` means the value is not secret.

use regex::Regex;
use std::sync::OnceLock;

/// A parsed publish-variable directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetVariable {
    /// Variable name as written.
    pub name: String,
    /// Value following the closing bracket.
    pub value: String,
    /// Whether the value must be registered as a secret.
    pub is_secret: bool,
}

fn directive_regex() -> &'static Regex {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    DIRECTIVE.get_or_init(|| {
        Regex::new(r"(?i)##vso\[task\.setvariable(?:\s+([^\]]*))?\](.*)$")
            .expect("directive pattern is a valid regex")
    })
}

/// Parse a publish-variable directive from one output line.
///
/// Returns `None` for ordinary output and for directives without a name.
///
/// # Example
///
/// ```
/// use conveyor::secrets::parse_set_variable;
///
/// let directive = parse_set_variable("##vso[task.setvariable variable=Token;isSecret=true]abc123")
///     .unwrap();
/// assert_eq!(directive.name, "Token");
/// assert_eq!(directive.value, "abc123");
/// assert!(directive.is_secret);
///
/// assert!(parse_set_variable("plain output").is_none());
/// ```
pub fn parse_set_variable(line: &str) -> Option<SetVariable> {
    let caps = directive_regex().captures(line)?;
    let properties = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let value = caps[2].trim_end_matches(['\r', '\n']).to_string();

    let mut name = None;
    let mut is_secret = false;

    for property in properties.split(';') {
        let Some((key, val)) = property.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let val = val.trim();

        match key.as_str() {
            "variable" | "name" if !val.is_empty() => name = Some(val.to_string()),
            "issecret" => is_secret = val.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    Some(SetVariable {
        name: name?,
        value,
        is_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_variable() {
        let d = parse_set_variable("##vso[task.setvariable variable=version]1.2.3").unwrap();
        assert_eq!(d.name, "version");
        assert_eq!(d.value, "1.2.3");
        assert!(!d.is_secret);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let d = parse_set_variable("##VSO[task.setVariable Variable=Pw;ISSECRET=True]x").unwrap();
        assert_eq!(d.name, "Pw");
        assert!(d.is_secret);
    }

    #[test]
    fn accepts_name_alias_and_prefix_text() {
        let d = parse_set_variable("2024-01-01T00:00:00Z ##vso[task.setvariable name=Out;isSecret=false]v")
            .unwrap();
        assert_eq!(d.name, "Out");
        assert_eq!(d.value, "v");
        assert!(!d.is_secret);
    }

    #[test]
    fn value_may_be_empty_or_contain_brackets() {
        let d = parse_set_variable("##vso[task.setvariable variable=e]").unwrap();
        assert_eq!(d.value, "");

        let d = parse_set_variable("##vso[task.setvariable variable=j]{\"a\":[1]}\r").unwrap();
        assert_eq!(d.value, "{\"a\":[1]}");
    }

    #[test]
    fn rejects_lines_without_a_name() {
        assert!(parse_set_variable("##vso[task.setvariable isSecret=true]x").is_none());
        assert!(parse_set_variable("##vso[task.setvariable]x").is_none());
        assert!(parse_set_variable("##vso[task.logissue type=error]x").is_none());
        assert!(parse_set_variable("echo hello").is_none());
    }
}
