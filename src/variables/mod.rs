//! Layered variables and token expansion.
//!
//! - [`VariableStore`] - Holds every variable scope of a run and flattens them
//! - [`expand`] - Resolves `${name}` / `$(name)` / `$(name:format)` tokens
//! - [`facts`] - The fixed agent, build and host layers
//!
//! # Example
//!
//! ```
//! use conveyor::variables::{Variable, VariableStore};
//!
//! let store = VariableStore::new().with_pipeline(vec![
//!     Variable::simple("name", "world"),
//!     Variable::simple("greeting", "hello ${name}"),
//! ]);
//!
//! assert_eq!(store.expand("$(greeting)!"), "hello world!");
//! ```

pub mod expand;
pub mod facts;
pub mod store;
pub mod value;

pub use expand::{expand, find_tokens, has_tokens, Token};
pub use facts::{agent_facts, build_facts, host_environment};
pub use store::{VariableStore, DATE_KEY, REV_KEY};
pub use value::{format_timestamp, Scalar, Variable, VariableMap};
