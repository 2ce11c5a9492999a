//! Token expansion for variable references.
//!
//! # Syntax
//!
//! - `${name}` or `$(name)` - replaced with the variable's value
//! - `$(name:format)` - timestamp values are rendered with `format`
//!
//! A token is an opening run of `$` followed by `{` or `(`, the shortest body
//! that reaches a closing run of `}` / `)` characters. Expansion repeats until
//! no resolvable token is left, so values that are themselves references
//! resolve transitively. Tokens that cannot be resolved are left untouched.
//!
//! # Example
//!
//! ```
//! use conveyor::variables::{expand, VariableMap};
//!
//! let mut vars = VariableMap::new();
//! vars.insert("target", "${arch}-linux");
//! vars.insert("arch", "x86_64");
//!
//! assert_eq!(expand("build --target $(target)", &vars), "build --target x86_64-linux");
//! assert_eq!(expand("${unknown}", &vars), "${unknown}");
//! ```

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::warn;

use super::value::VariableMap;

/// Upper bound on expansion passes; only self-growing references reach it.
const MAX_PASSES: usize = 64;

/// A token found in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Full token text, e.g. `$(Date:yyyyMMdd)`.
    pub text: String,
    /// Text between the opening and closing runs, e.g. `Date:yyyyMMdd`.
    pub body: String,
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"\$+[{(](.+?)[})]+").expect("token pattern is a valid regex")
    })
}

/// Find every token in `input`, in order of appearance.
pub fn find_tokens(input: &str) -> Vec<Token> {
    token_regex()
        .captures_iter(input)
        .map(|caps| Token {
            text: caps[0].to_string(),
            body: caps[1].to_string(),
        })
        .collect()
}

/// Check if a string contains anything that looks like a token.
pub fn has_tokens(input: &str) -> bool {
    token_regex().is_match(input)
}

/// Resolve a token body against `lookup`.
///
/// The whole body is tried as a name first; otherwise the text before the
/// first `:` is the name and the rest is a format applied to timestamps.
pub fn resolve_body(body: &str, lookup: &VariableMap) -> Option<String> {
    let whole = body.trim();
    if let Some(value) = lookup.get(whole) {
        return Some(value.render(None));
    }

    let (name, format) = whole.split_once(':')?;
    lookup
        .get(name.trim())
        .map(|value| value.render(Some(format)))
}

/// Expand `input` against `lookup` until a fixed point is reached.
pub fn expand(input: &str, lookup: &VariableMap) -> String {
    let mut result = input.to_string();
    let mut unresolved: HashSet<String> = HashSet::new();

    for _ in 0..MAX_PASSES {
        let mut seen: HashSet<String> = HashSet::new();
        let pending: Vec<Token> = find_tokens(&result)
            .into_iter()
            .filter(|t| !unresolved.contains(&t.text) && seen.insert(t.text.clone()))
            .collect();

        if pending.is_empty() {
            return result;
        }

        let before = result.clone();
        for token in pending {
            match resolve_body(&token.body, lookup) {
                Some(value) => result = result.replace(&token.text, &value),
                None => {
                    unresolved.insert(token.text);
                }
            }
        }

        // A pass that only resolved tokens to themselves cannot make progress.
        if result == before {
            return result;
        }
    }

    warn!(
        "Variable expansion stopped after {} passes; a variable probably references itself",
        MAX_PASSES
    );
    result
}
