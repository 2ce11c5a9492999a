//! Agent configuration schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::variables::{Scalar, Variable};

/// Settings for one agent, built by the host and handed to the run context.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name reported as `Agent.Name`.
    pub agent_name: String,

    /// Working directory; defaults to the current directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    /// Build id reported as `Build.BuildId`.
    pub build_id: u64,

    /// Definition name reported as `Build.DefinitionName`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_name: Option<String>,

    /// Expose host environment variables to the pipeline.
    pub include_host_env: bool,

    /// Register host environment values with secret-looking names as secrets.
    pub mask_host_secrets: bool,

    /// Additional host variable names whose values are secrets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_env: Vec<String>,

    /// Extra pipeline-level variables; these override the pipeline file.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Scalar>,

    /// Secret values to mask from the start of the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,

    /// Log what steps would do without running them.
    #[serde(default, skip_serializing_if = "is_false")]
    pub dry_run: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_name: "conveyor".to_string(),
            work_dir: None,
            build_id: 1,
            definition_name: None,
            include_host_env: true,
            mask_host_secrets: true,
            secret_env: Vec::new(),
            variables: BTreeMap::new(),
            secrets: Vec::new(),
            dry_run: false,
        }
    }
}

impl AgentConfig {
    /// Set the working directory.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Add an extra pipeline-level variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Add a secret value.
    pub fn with_secret(mut self, value: impl Into<String>) -> Self {
        self.secrets.push(value.into());
        self
    }

    /// Enable or disable the host environment layer.
    pub fn with_host_env(mut self, include: bool) -> Self {
        self.include_host_env = include;
        self
    }

    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The working directory, falling back to the current directory.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directory for agent-owned files under the working directory.
    pub fn agent_dir(&self) -> PathBuf {
        agent_dir(&self.work_dir())
    }

    /// Directory for transient files such as generated scripts.
    pub fn temp_dir(&self) -> PathBuf {
        self.agent_dir().join("tmp")
    }

    /// Extra variables as model entries.
    pub fn extra_variables(&self) -> Vec<Variable> {
        self.variables
            .iter()
            .map(|(name, value)| Variable::simple(name.clone(), value.clone()))
            .collect()
    }
}

/// `.conveyor` under `work_dir`.
pub fn agent_dir(work_dir: &Path) -> PathBuf {
    work_dir.join(".conveyor")
}
