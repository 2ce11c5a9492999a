//! Agent configuration file discovery and loading.

use std::fs;
use std::path::{Path, PathBuf};

use super::agent::{agent_dir, AgentConfig};
use crate::error::{ConveyorError, Result};

/// File name looked up under `.conveyor/` when no path is given.
pub const CONFIG_FILE_NAME: &str = "agent.yml";

/// Find `.conveyor/agent.yml` under `work_dir`, if it exists.
pub fn discover_config(work_dir: &Path) -> Option<PathBuf> {
    let path = agent_dir(work_dir).join(CONFIG_FILE_NAME);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

/// Load an agent configuration file.
pub fn load_config_file(path: &Path) -> Result<AgentConfig> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, path)
}

/// Parse YAML content into an [`AgentConfig`].
///
/// # Example
///
/// ```
/// use conveyor::config::parse_config;
/// use std::path::Path;
///
/// let config = parse_config("agent_name: builder\n", Path::new("agent.yml")).unwrap();
/// assert_eq!(config.agent_name, "builder");
/// ```
pub fn parse_config(content: &str, source_path: &Path) -> Result<AgentConfig> {
    if content.trim().is_empty() {
        return Ok(AgentConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConveyorError::ConfigParse {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load the explicit file if given, else the discovered one, else defaults.
pub fn load_config(explicit: Option<&Path>, work_dir: &Path) -> Result<AgentConfig> {
    match explicit
        .map(Path::to_path_buf)
        .or_else(|| discover_config(work_dir))
    {
        Some(path) => load_config_file(&path),
        None => Ok(AgentConfig::default()),
    }
}
