//! Fixed variables describing the agent, the build and the host.

use std::path::Path;

use super::value::VariableMap;
use crate::config::AgentConfig;

/// Facts about the machine running the pipeline (`Agent.*`).
pub fn agent_facts(config: &AgentConfig) -> VariableMap {
    let work = config.agent_dir();
    let mut facts = VariableMap::new();

    facts.insert("Agent.Name", config.agent_name.as_str());
    facts.insert("Agent.MachineName", machine_name());
    facts.insert("Agent.OS", os_name());
    facts.insert("Agent.OSArchitecture", architecture());
    facts.insert("Agent.Version", env!("CARGO_PKG_VERSION"));
    facts.insert("Agent.WorkFolder", display(&work));
    facts.insert("Agent.TempDirectory", display(&config.temp_dir()));
    facts.insert("Agent.HomeDirectory", display(&work));
    facts.insert("Agent.BuildDirectory", display(&work));
    facts
}

/// Facts about the current run (`Build.*`, `Pipeline.*`, `System.*`).
///
/// `definition_name` is used when the config does not name the definition.
pub fn build_facts(config: &AgentConfig, definition_name: &str) -> VariableMap {
    let sources = config.work_dir();
    let work = config.agent_dir();
    let build_id = config.build_id.to_string();
    let definition = config
        .definition_name
        .clone()
        .unwrap_or_else(|| definition_name.to_string());

    let mut facts = VariableMap::new();
    facts.insert("Build.BuildId", build_id.as_str());
    facts.insert("Build.BuildNumber", build_id.as_str());
    facts.insert("Build.DefinitionName", definition);
    facts.insert("Build.Reason", "Manual");
    facts.insert("Build.SourcesDirectory", display(&sources));
    facts.insert("Build.Repository.LocalPath", display(&sources));
    facts.insert("Build.ArtifactStagingDirectory", display(&work.join("a")));
    facts.insert("Build.BinariesDirectory", display(&work.join("b")));
    facts.insert("Build.StagingDirectory", display(&work.join("a")));
    facts.insert("Pipeline.Workspace", display(&work));
    facts.insert("System.DefaultWorkingDirectory", display(&sources));
    facts.insert("System.JobId", build_id);
    facts
}

/// The process environment.
pub fn host_environment() -> VariableMap {
    std::env::vars().collect()
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn machine_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}

fn os_name() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows_NT",
        "macos" => "Darwin",
        _ => "Linux",
    }
}

fn architecture() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "X64",
        "x86" => "X86",
        "aarch64" => "ARM64",
        "arm" => "ARM",
        other => other,
    }
}
