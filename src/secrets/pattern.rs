//! Secret detection for host environment variables.
//!
//! Environment variables whose names look like credentials have their values
//! registered in the run's [`SecretVault`](super::SecretVault) before any step
//! output is produced.

use regex::Regex;
use tracing::debug;

use crate::variables::VariableMap;

/// A pattern that identifies secret environment variable names.
#[derive(Debug, Clone)]
pub struct SecretPattern {
    /// Name of this pattern (for debugging).
    pub name: String,
    /// Regex matched against the variable name.
    pub env_pattern: Regex,
}

/// Built-in patterns for common secrets, as `(name, regex)` pairs.
pub const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("api_key", r"(?i)^.*_?(API_?KEY|APIKEY)$"),
    ("secret", r"(?i)^.*_?(SECRET|SECRET_KEY)$"),
    ("token", r"(?i)^.*_?(TOKEN|ACCESS_TOKEN|AUTH_TOKEN)$"),
    ("pat", r"(?i)(^|[_.])PAT$"),
    ("password", r"(?i)^.*_?(PASSWORD|PASSWD)$"),
    ("credential", r"(?i)^.*_?CREDENTIALS?$"),
    ("private_key", r"(?i)^.*_?PRIVATE_KEY$"),
    (
        "connection_string",
        r"(?i)^.*(CONNECTION_?STRING|DATABASE_URL)$",
    ),
];

/// Matches variable names against secret patterns.
///
/// # Example
///
/// ```
/// use conveyor::secrets::SecretMatcher;
///
/// let matcher = SecretMatcher::with_builtins();
///
/// assert!(matcher.is_secret("NUGET_API_KEY"));
/// assert!(matcher.is_secret("System.AccessToken"));
/// assert!(!matcher.is_secret("PATH"));
/// ```
#[derive(Debug, Clone)]
pub struct SecretMatcher {
    patterns: Vec<SecretPattern>,
}

impl SecretMatcher {
    /// Create a matcher with built-in patterns.
    pub fn with_builtins() -> Self {
        let patterns = BUILTIN_PATTERNS
            .iter()
            .filter_map(|(name, pattern)| {
                Regex::new(pattern).ok().map(|env_pattern| SecretPattern {
                    name: name.to_string(),
                    env_pattern,
                })
            })
            .collect();

        Self { patterns }
    }

    /// Create a matcher with custom patterns only.
    pub fn new(patterns: Vec<SecretPattern>) -> Self {
        Self { patterns }
    }

    /// Create a matcher with built-in patterns plus exact, case-insensitive
    /// matches for `custom_names`.
    ///
    /// # Example
    ///
    /// ```
    /// use conveyor::secrets::SecretMatcher;
    ///
    /// let matcher = SecretMatcher::with_builtins_and_custom(&["SIGNING_PHRASE".to_string()]);
    /// assert!(matcher.is_secret("signing_phrase"));
    /// assert!(!matcher.is_secret("SIGNING_PHRASE_FILE"));
    /// ```
    pub fn with_builtins_and_custom(custom_names: &[String]) -> Self {
        let mut matcher = Self::with_builtins();

        for name in custom_names {
            if let Ok(pattern) = Regex::new(&format!("(?i)^{}$", regex::escape(name))) {
                matcher.add_pattern(SecretPattern {
                    name: format!("custom:{}", name),
                    env_pattern: pattern,
                });
            }
        }

        matcher
    }

    /// Add a custom pattern.
    pub fn add_pattern(&mut self, pattern: SecretPattern) {
        self.patterns.push(pattern);
    }

    /// Check if a variable name matches any secret pattern.
    pub fn is_secret(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.env_pattern.is_match(name))
    }

    /// Values of every entry in `vars` whose name matches a secret pattern.
    pub fn secret_values(&self, vars: &VariableMap) -> Vec<String> {
        vars.iter()
            .filter(|(name, _)| self.is_secret(name))
            .map(|(name, value)| {
                debug!("Treating variable {} as secret", name);
                value.to_string()
            })
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Number of patterns.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for SecretMatcher {
    fn default() -> Self {
        Self::with_builtins()
    }
}
