//! Layered variable storage.
//!
//! Variables come from several scopes, merged in priority order (last wins):
//!
//! 1. Fixed agent facts (`Agent.*`)
//! 2. Fixed build facts (`Build.*`, `Pipeline.*`, `System.*`)
//! 3. Host environment variables
//! 4. Pipeline-level variables
//! 5. Stage-level variables
//! 6. Job-level variables
//! 7. Step-level variables
//! 8. Runtime variables set by steps while the job runs
//!
//! The merged result is cached until a scope changes.

use chrono::{DateTime, Utc};
use std::cell::OnceCell;

use super::expand::expand;
use super::value::{Scalar, Variable, VariableMap};

/// Ambient key holding the current UTC timestamp.
pub const DATE_KEY: &str = "Date";

/// Ambient key holding an empty placeholder.
pub const REV_KEY: &str = "Rev";

/// Holds every variable scope for one pipeline run.
///
/// # Example
///
/// ```
/// use conveyor::variables::{Variable, VariableStore};
///
/// let mut store = VariableStore::new()
///     .with_pipeline(vec![Variable::simple("configuration", "Debug")]);
///
/// store.bind(&[Variable::simple("configuration", "Release")], &[], &[]);
/// assert_eq!(store.render("Configuration").as_deref(), Some("Release"));
///
/// store.set_runtime("configuration", "Profile");
/// assert_eq!(store.expand("-c $(configuration)"), "-c Profile");
/// ```
#[derive(Debug)]
pub struct VariableStore {
    agent: VariableMap,
    build: VariableMap,
    host: VariableMap,
    pipeline: Vec<Variable>,
    stage: Vec<Variable>,
    job: Vec<Variable>,
    step: Vec<Variable>,
    runtime: VariableMap,
    clock: fn() -> DateTime<Utc>,
    cache: OnceCell<VariableMap>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            agent: VariableMap::new(),
            build: VariableMap::new(),
            host: VariableMap::new(),
            pipeline: Vec::new(),
            stage: Vec::new(),
            job: Vec::new(),
            step: Vec::new(),
            runtime: VariableMap::new(),
            clock: Utc::now,
            cache: OnceCell::new(),
        }
    }

    /// Set the fixed agent facts.
    pub fn with_agent_facts(mut self, facts: VariableMap) -> Self {
        self.agent = facts;
        self.invalidate();
        self
    }

    /// Set the fixed build facts.
    pub fn with_build_facts(mut self, facts: VariableMap) -> Self {
        self.build = facts;
        self.invalidate();
        self
    }

    /// Set the host environment layer.
    pub fn with_host_env(mut self, env: VariableMap) -> Self {
        self.host = env;
        self.invalidate();
        self
    }

    /// Set the pipeline-level variables.
    pub fn with_pipeline(mut self, variables: Vec<Variable>) -> Self {
        self.pipeline = variables;
        self.invalidate();
        self
    }

    /// Replace the clock used for the [`DATE_KEY`] entry.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self.invalidate();
        self
    }

    /// Rebind the stage, job and step scopes.
    ///
    /// The previous step's variables are dropped, so step-level shadowing never
    /// leaks into the next step.
    pub fn bind(&mut self, stage: &[Variable], job: &[Variable], step: &[Variable]) {
        self.stage = stage.to_vec();
        self.job = job.to_vec();
        self.step = step.to_vec();
        self.invalidate();
    }

    /// Set a runtime variable. Runtime variables outrank every declared scope.
    pub fn set_runtime(&mut self, name: impl Into<String>, value: impl Into<Scalar>) {
        self.runtime.insert(name, value);
        self.invalidate();
    }

    /// Drop all runtime variables.
    pub fn clear_runtime(&mut self) {
        if !self.runtime.is_empty() {
            self.runtime.clear();
            self.invalidate();
        }
    }

    /// Runtime variables set so far in the current job.
    pub fn runtime(&self) -> &VariableMap {
        &self.runtime
    }

    /// Discard the cached flattened lookup.
    pub fn invalidate(&mut self) {
        self.cache = OnceCell::new();
    }

    /// Merge the fixed layers with the given declared scopes.
    ///
    /// Entries that are not simple name/value pairs are skipped. The ambient
    /// [`DATE_KEY`] and [`REV_KEY`] entries are always present, and runtime
    /// variables are merged last.
    pub fn build_lookup(
        &self,
        pipeline: &[Variable],
        stage: &[Variable],
        job: &[Variable],
        step: &[Variable],
    ) -> VariableMap {
        let mut map = VariableMap::new();
        map.extend_from(&self.agent);
        map.extend_from(&self.build);
        map.extend_from(&self.host);

        for scope in [pipeline, stage, job, step] {
            for (name, value) in scope.iter().filter_map(Variable::as_simple) {
                map.insert(name, value.clone());
            }
        }

        map.insert(DATE_KEY, Scalar::Timestamp((self.clock)()));
        map.insert(REV_KEY, "");

        map.extend_from(&self.runtime);
        map
    }

    /// The flattened lookup for the currently bound scopes.
    pub fn lookup(&self) -> &VariableMap {
        self.cache.get_or_init(|| {
            self.build_lookup(&self.pipeline, &self.stage, &self.job, &self.step)
        })
    }

    /// Expand every resolvable token in `input`.
    pub fn expand(&self, input: &str) -> String {
        expand(input, self.lookup())
    }

    /// Look up a variable and expand its value, so variables that reference
    /// other variables resolve transparently.
    pub fn render(&self, name: &str) -> Option<String> {
        let raw = self.lookup().get(name)?.to_string();
        Some(self.expand(&raw))
    }
}
