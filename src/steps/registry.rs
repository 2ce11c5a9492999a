//! Registry mapping step kinds and task names to runner constructors.

use std::collections::HashMap;

use tracing::debug;

use super::checkout::CheckoutRunner;
use super::script::ScriptRunner;
use super::{StepDispatcher, StepRunner};
use crate::pipeline::{Step, StepKind};

/// Builds a runner for a step, or declines it.
pub type RunnerFactory = fn(&Step) -> Option<Box<dyn StepRunner>>;

/// Step kinds that resolve by kind rather than by task name.
const SCRIPT_KIND: &str = "script";
const CHECKOUT_KIND: &str = "checkout";

/// Explicit registry of step runners.
///
/// Task names are matched case-insensitively. Template references never
/// resolve; they are meant to be expanded before a pipeline reaches the agent.
#[derive(Default)]
pub struct StepRegistry {
    kinds: HashMap<&'static str, RunnerFactory>,
    tasks: HashMap<String, RunnerFactory>,
}

impl StepRegistry {
    /// An empty registry that resolves nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in runners: inline scripts, checkout and the
    /// `CmdLine@2`, `Bash@3` and `ShellScript@2` tasks.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_kind(SCRIPT_KIND, ScriptRunner::for_script);
        registry.register_kind(CHECKOUT_KIND, CheckoutRunner::for_step);
        registry.register_task("CmdLine@2", ScriptRunner::for_cmdline_task);
        registry.register_task("Bash@3", ScriptRunner::for_bash_task);
        registry.register_task("ShellScript@2", ScriptRunner::for_shell_script_task);
        registry
    }

    /// Register the constructor for a step kind (`script` or `checkout`).
    pub fn register_kind(&mut self, kind: &'static str, factory: RunnerFactory) {
        self.kinds.insert(kind, factory);
    }

    /// Register the constructor for a task name such as `Bash@3`.
    pub fn register_task(&mut self, task: &str, factory: RunnerFactory) {
        self.tasks.insert(task.to_lowercase(), factory);
    }

    /// Whether a task name has a runner.
    pub fn has_task(&self, task: &str) -> bool {
        self.tasks.contains_key(&task.to_lowercase())
    }

    /// Registered task names, lower-cased and sorted.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn factory_for(&self, step: &Step) -> Option<RunnerFactory> {
        match &step.kind {
            StepKind::Script { .. } => self.kinds.get(SCRIPT_KIND).copied(),
            StepKind::Checkout { .. } => self.kinds.get(CHECKOUT_KIND).copied(),
            StepKind::Task { task, .. } => self.tasks.get(&task.to_lowercase()).copied(),
            StepKind::Template(_) => None,
        }
    }
}

impl StepDispatcher for StepRegistry {
    fn resolve(&self, step: &Step) -> Option<Box<dyn StepRunner>> {
        let runner = self.factory_for(step).and_then(|factory| factory(step));
        if runner.is_none() {
            debug!(step = %step.label(0), "No runner registered");
        }
        runner
    }
}
