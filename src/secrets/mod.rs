//! Secret registration, detection and masking.
//!
//! - [`SecretVault`] - Holds the run's secret values and masks them out of text
//! - [`SecretMatcher`] - Flags host environment variables that look like secrets
//! - [`parse_set_variable`] - Reads the publish-variable directive from step output
//!
//! # Example
//!
//! ```
//! use conveyor::secrets::{SecretMatcher, SecretVault};
//!
//! let matcher = SecretMatcher::with_builtins();
//! assert!(matcher.is_secret("GITHUB_TOKEN"));
//!
//! let mut vault = SecretVault::new();
//! vault.add_secret("ghp_abc");
//! assert_eq!(vault.mask("token ghp_abc"), "token ********");
//! ```

pub mod directive;
pub mod pattern;
pub mod vault;

pub use directive::{parse_set_variable, SetVariable};
pub use pattern::{SecretMatcher, SecretPattern, BUILTIN_PATTERNS};
pub use vault::{MaskingWriter, SecretVault, MASK};
