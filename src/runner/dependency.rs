//! Job dependency resolution.
//!
//! [`DependencyGraph`] answers static questions about a batch of jobs: which
//! references are unknown and whether there is a cycle. [`DependencyResolver`]
//! drives the actual run: it hands out one [`JobAction`] at a time in repeated passes
//! over the pending jobs until none remain or a pass makes no progress.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::status::{StatusLedger, StatusType};

/// A schedulable unit with optional prerequisites.
pub trait DependencyNode {
    /// Name other nodes refer to; unnamed nodes cannot be depended on.
    fn name(&self) -> Option<&str>;

    /// Names of the nodes that must resolve first.
    fn depends_on(&self) -> &[String];

    /// Whether an error in this node is tolerated.
    fn continue_on_error(&self) -> bool;
}

/// The dependency relationships between named jobs.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Map of job name to its direct, known dependencies.
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// References to names that are not in the graph, as `(job, dependency)`.
    unknown: Vec<(String, String)>,
}

impl DependencyGraph {
    /// Create a new dependency graph builder.
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::new()
    }

    /// Build a graph from the named nodes of a batch.
    pub fn from_nodes<N: DependencyNode>(nodes: &[N]) -> Self {
        nodes
            .iter()
            .filter_map(|n| n.name().map(|name| (name, n.depends_on())))
            .fold(Self::builder(), |builder, (name, deps)| {
                builder.add_job(name, deps.to_vec())
            })
            .build()
    }

    /// Dependencies that name a job outside the graph, as `(job, dependency)`.
    pub fn unknown_dependencies(&self) -> &[(String, String)] {
        &self.unknown
    }

    /// Find a cycle in the graph, returning the path if one exists.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        let mut state: HashMap<&str, State> = self
            .dependencies
            .keys()
            .map(|j| (j.as_str(), State::Unvisited))
            .collect();

        let mut path: Vec<String> = Vec::new();

        fn dfs<'a>(
            node: &'a str,
            graph: &'a DependencyGraph,
            state: &mut HashMap<&'a str, State>,
            path: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            state.insert(node, State::Visiting);
            path.push(node.to_string());

            if let Some(deps) = graph.dependencies.get(node) {
                for dep in deps {
                    match state.get(dep.as_str()) {
                        Some(State::Visiting) => {
                            let start = path.iter().position(|s| s == dep).unwrap_or(0);
                            let mut cycle: Vec<String> = path[start..].to_vec();
                            cycle.push(dep.clone());
                            return Some(cycle);
                        }
                        Some(State::Unvisited) | None => {
                            if let Some(cycle) = dfs(dep, graph, state, path) {
                                return Some(cycle);
                            }
                        }
                        Some(State::Visited) => {}
                    }
                }
            }

            path.pop();
            state.insert(node, State::Visited);
            None
        }

        for job in self.dependencies.keys() {
            if state.get(job.as_str()) == Some(&State::Unvisited) {
                if let Some(cycle) = dfs(job, self, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }
}

/// Builder for constructing a DependencyGraph.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    dependencies: BTreeMap<String, Vec<String>>,
}

impl DependencyGraphBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job with its dependencies. Repeated names merge their lists.
    pub fn add_job(mut self, name: impl Into<String>, depends_on: Vec<String>) -> Self {
        self.dependencies
            .entry(name.into())
            .or_default()
            .extend(depends_on);
        self
    }

    /// Build the dependency graph.
    ///
    /// References to unknown jobs are kept aside and reported by
    /// [`DependencyGraph::unknown_dependencies`].
    pub fn build(self) -> DependencyGraph {
        let mut unknown = Vec::new();
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (job, deps) in &self.dependencies {
            let known = dependencies.entry(job.clone()).or_default();
            for dep in deps {
                if self.dependencies.contains_key(dep) {
                    known.insert(dep.clone());
                } else {
                    unknown.push((job.clone(), dep.clone()));
                }
            }
        }

        DependencyGraph {
            dependencies,
            unknown,
        }
    }
}

/// The next thing the scheduler must do with a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobAction {
    /// Execute the job, then report with [`DependencyResolver::complete`].
    Run(usize),
    /// The job was recorded `Skipped` because a dependency failed.
    Skip { index: usize, dependency: String },
    /// The job was recorded `Error` because a dependency does not exist.
    Missing { index: usize, dependency: String },
    /// No progress was possible; the remaining jobs were recorded `Error`.
    Cycle {
        remaining: Vec<usize>,
        path: Option<Vec<String>>,
    },
}

/// Iterative fixed-point scheduler for jobs with dependencies.
///
/// Jobs are visited in declared order, pass after pass. A job runs once every
/// dependency has a terminal status and none of them is `Error`. Jobs that
/// become eligible in the same pass run one after another.
///
/// # Example
///
/// ```
/// use conveyor::runner::{DependencyNode, DependencyResolver, JobAction, StatusType};
///
/// struct Job(&'static str, Vec<String>);
///
/// impl DependencyNode for Job {
///     fn name(&self) -> Option<&str> { Some(self.0) }
///     fn depends_on(&self) -> &[String] { &self.1 }
///     fn continue_on_error(&self) -> bool { false }
/// }
///
/// let jobs = vec![Job("test", vec!["build".into()]), Job("build", vec![])];
/// let mut resolver = DependencyResolver::new(&jobs);
///
/// assert_eq!(resolver.next_action(), Some(JobAction::Run(1)));
/// resolver.complete(1, StatusType::Error);
///
/// assert!(matches!(resolver.next_action(), Some(JobAction::Skip { index: 0, .. })));
/// assert_eq!(resolver.next_action(), None);
/// assert_eq!(resolver.aggregate(), StatusType::Error);
/// ```
pub struct DependencyResolver<'a, N: DependencyNode> {
    nodes: &'a [N],
    by_name: HashMap<&'a str, usize>,
    pending: Vec<usize>,
    ledger: StatusLedger,
    aggregate: StatusType,
    cursor: usize,
    progressed: bool,
    finished: bool,
}

impl<'a, N: DependencyNode> DependencyResolver<'a, N> {
    /// Start resolving `nodes`. The first node with a given name wins lookups.
    pub fn new(nodes: &'a [N]) -> Self {
        let mut by_name = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            if let Some(name) = node.name() {
                by_name.entry(name).or_insert(index);
            }
        }

        Self {
            nodes,
            by_name,
            pending: (0..nodes.len()).collect(),
            ledger: StatusLedger::new(nodes.len()),
            aggregate: StatusType::Complete,
            cursor: 0,
            progressed: false,
            finished: false,
        }
    }

    /// Decide what happens next, or `None` once every job is resolved.
    pub fn next_action(&mut self) -> Option<JobAction> {
        loop {
            if self.finished {
                return None;
            }

            if self.cursor >= self.pending.len() {
                if self.pending.is_empty() {
                    self.finished = true;
                    return None;
                }
                if !self.progressed {
                    return Some(self.fail_remaining());
                }
                self.cursor = 0;
                self.progressed = false;
                continue;
            }

            let index = self.pending[self.cursor];
            match self.evaluate(index) {
                Readiness::Waiting => self.cursor += 1,
                Readiness::Missing(dependency) => {
                    self.resolve(index, StatusType::Error);
                    self.aggregate = StatusType::Error;
                    return Some(JobAction::Missing { index, dependency });
                }
                Readiness::Failed(dependency) => {
                    self.resolve(index, StatusType::Skipped);
                    self.aggregate = self.aggregate.combine(StatusType::Skipped);
                    return Some(JobAction::Skip { index, dependency });
                }
                Readiness::Ready => {
                    self.pending.remove(self.cursor);
                    self.progressed = true;
                    self.ledger.start(index);
                    return Some(JobAction::Run(index));
                }
            }
        }
    }

    /// Record the outcome of a job handed out by [`JobAction::Run`].
    ///
    /// Errors are downgraded to warnings for jobs that continue on error.
    /// Returns the recorded status.
    pub fn complete(&mut self, index: usize, status: StatusType) -> StatusType {
        let continue_on_error = self
            .nodes
            .get(index)
            .is_some_and(|node| node.continue_on_error());
        let status = status.downgrade(continue_on_error);

        if self.ledger.record(index, status) {
            self.aggregate = self.aggregate.combine(status);
        }
        self.ledger.get(index)
    }

    /// The combined status of every resolved job so far.
    pub fn aggregate(&self) -> StatusType {
        self.aggregate
    }

    /// Status recorded for a job.
    pub fn status_of(&self, index: usize) -> StatusType {
        self.ledger.get(index)
    }

    /// Statuses of all jobs in declared order.
    pub fn statuses(&self) -> &[StatusType] {
        self.ledger.statuses()
    }

    fn evaluate(&self, index: usize) -> Readiness {
        let deps = self.nodes[index].depends_on();

        let mut targets = Vec::with_capacity(deps.len());
        for dep in deps {
            match self.by_name.get(dep.as_str()) {
                Some(&target) => targets.push((dep, target)),
                None => return Readiness::Missing(dep.clone()),
            }
        }

        if let Some((dep, _)) = targets
            .iter()
            .find(|(_, t)| self.ledger.get(*t) == StatusType::Error)
        {
            return Readiness::Failed((*dep).clone());
        }

        if targets.iter().all(|(_, t)| self.ledger.get(*t).is_terminal()) {
            Readiness::Ready
        } else {
            Readiness::Waiting
        }
    }

    fn resolve(&mut self, index: usize, status: StatusType) {
        self.pending.remove(self.cursor);
        self.progressed = true;
        self.ledger.record(index, status);
    }

    fn fail_remaining(&mut self) -> JobAction {
        let remaining = std::mem::take(&mut self.pending);
        for &index in &remaining {
            self.ledger.record(index, StatusType::Error);
        }
        self.aggregate = StatusType::Error;
        self.finished = true;

        let path = remaining
            .iter()
            .map(|&i| &self.nodes[i])
            .filter_map(|n| n.name().map(|name| (name, n.depends_on())))
            .fold(DependencyGraph::builder(), |builder, (name, deps)| {
                builder.add_job(name, deps.to_vec())
            })
            .build()
            .find_cycle();

        JobAction::Cycle { remaining, path }
    }
}

enum Readiness {
    Ready,
    Waiting,
    Missing(String),
    Failed(String),
}
