//! Agent configuration.
//!
//! The host builds an [`AgentConfig`] (from an optional YAML file, then CLI
//! flags) and hands it to the run context; nothing else reads settings.
//!
//! # Example
//!
//! ```
//! use conveyor::config::load_config;
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::create_dir_all(temp.path().join(".conveyor")).unwrap();
//! fs::write(temp.path().join(".conveyor/agent.yml"), "agent_name: ci\n").unwrap();
//!
//! let config = load_config(None, temp.path()).unwrap();
//! assert_eq!(config.agent_name, "ci");
//! ```

pub mod agent;
pub mod loader;

pub use agent::AgentConfig;
pub use loader::{discover_config, load_config, load_config_file, parse_config, CONFIG_FILE_NAME};
