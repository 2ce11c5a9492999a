//! Pipeline file schema definitions.
//!
//! These structs map one-to-one onto the YAML pipeline format. Every field is
//! optional here; [`loader`](super::loader) decides what each element is and
//! turns it into the [`model`](super::model) types.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::variables::{Scalar, Variable};

/// Root of a pipeline file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Run name format.
    pub name: Option<String>,

    /// Pipeline-level variables.
    pub variables: Option<VariablesConfig>,

    /// Stages, for multi-stage pipelines.
    pub stages: Vec<StageConfig>,

    /// Jobs of a single implicit stage.
    pub jobs: Vec<JobConfig>,

    /// Steps of a single implicit job.
    pub steps: Vec<StepConfig>,
}

/// Variables as either a `name: value` map or a list of entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariablesConfig {
    Map(BTreeMap<String, Scalar>),
    List(Vec<VariableEntry>),
}

/// One entry of a variable list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariableEntry {
    Simple { name: String, value: Scalar },
    Group { group: String },
    Template { template: String },
}

impl VariablesConfig {
    /// Convert to model variables, keeping list order.
    pub fn into_variables(self) -> Vec<Variable> {
        match self {
            VariablesConfig::Map(map) => map
                .into_iter()
                .map(|(name, value)| Variable::Simple { name, value })
                .collect(),
            VariablesConfig::List(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    VariableEntry::Simple { name, value } => Variable::Simple { name, value },
                    VariableEntry::Group { group } => Variable::Group { group },
                    VariableEntry::Template { template } => Variable::Template { template },
                })
                .collect(),
        }
    }
}

/// `dependsOn` as a single name or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependsOnConfig {
    One(String),
    Many(Vec<String>),
}

impl DependsOnConfig {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            DependsOnConfig::One(name) => vec![name],
            DependsOnConfig::Many(names) => names,
        }
    }
}

/// A stage entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StageConfig {
    pub stage: Option<String>,
    pub display_name: Option<String>,
    pub template: Option<String>,
    pub variables: Option<VariablesConfig>,
    pub jobs: Vec<JobConfig>,
}

/// A job entry: standard (`job:`), deployment (`deployment:`) or template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobConfig {
    pub job: Option<String>,
    pub deployment: Option<String>,
    pub template: Option<String>,
    pub parameters: BTreeMap<String, Scalar>,
    pub display_name: Option<String>,
    pub depends_on: Option<DependsOnConfig>,
    pub continue_on_error: bool,
    pub variables: Option<VariablesConfig>,
    pub environment: Option<EnvironmentConfig>,
    pub strategy: Option<StrategyConfig>,
    pub steps: Vec<StepConfig>,
}

/// Deployment environment, by name or as `{ name: ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentConfig {
    Name(String),
    Detailed { name: String },
}

impl EnvironmentConfig {
    pub fn name(&self) -> &str {
        match self {
            EnvironmentConfig::Name(name) | EnvironmentConfig::Detailed { name } => name,
        }
    }
}

/// Deployment strategy; only `runOnce` is supported.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StrategyConfig {
    pub run_once: Option<RunOnceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunOnceConfig {
    pub deploy: Option<HookConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub steps: Vec<StepConfig>,
}

/// A step entry. Exactly one of the kind fields must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StepConfig {
    pub script: Option<String>,
    pub bash: Option<String>,
    pub pwsh: Option<String>,
    pub powershell: Option<String>,
    pub task: Option<String>,
    pub checkout: Option<String>,
    pub template: Option<String>,
    pub inputs: BTreeMap<String, Scalar>,
    pub parameters: BTreeMap<String, Scalar>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub enabled: Option<bool>,
    pub env: BTreeMap<String, Scalar>,
}
