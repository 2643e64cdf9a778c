//! Recursive cost roll-up
//!
//! The cost of a produced item is the sum of its recipe lines, each line
//! being `quantity × unit cost`. Raw components carry their purchase cost;
//! semi-finished components take the resolved cost of the order that made
//! them. The walk is a depth-first traversal over an explicit frame stack,
//! memoized in an [`ItemCostIndex`] so shared sub-assemblies are costed once.
//! Cycles are taken from the graph up front and never walked.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::error::ResolveIssue;
use crate::graph::DependencyGraph;
use crate::models::{NodeKey, RecipeLine, ResolutionState};
use crate::report::{ReportEntry, ResolutionReport};

/// Resolved unit cost per produced item and order
///
/// Holds an entry only for fully resolved nodes. Entries are write-once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemCostIndex {
    costs: BTreeMap<NodeKey, Decimal>,
}

impl ItemCostIndex {
    pub fn get(&self, key: &NodeKey) -> Option<Decimal> {
        self.costs.get(key).copied()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.costs.contains_key(key)
    }

    /// Store a cost; returns false and keeps the old value if one exists
    pub fn insert(&mut self, key: NodeKey, cost: Decimal) -> bool {
        if self.costs.contains_key(&key) {
            return false;
        }
        self.costs.insert(key, cost);
        true
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &Decimal)> {
        self.costs.iter()
    }
}

#[derive(Debug, Clone)]
struct Failure {
    state: ResolutionState,
    issues: Vec<ResolveIssue>,
}

impl Failure {
    fn cause(&self) -> ResolveIssue {
        self.issues.first().cloned().unwrap_or_else(|| ResolveIssue::CircularDependency {
            cycle: Vec::new(),
        })
    }
}

/// A node being costed; its position in the stack marks it in progress
struct Frame {
    key: NodeKey,
    next: usize,
    total: Decimal,
    pending_quantity: Decimal,
    issues: Vec<ResolveIssue>,
}

impl Frame {
    fn new(key: NodeKey) -> Self {
        Self {
            key,
            next: 0,
            total: Decimal::ZERO,
            pending_quantity: Decimal::ZERO,
            issues: Vec::new(),
        }
    }

    fn absorb(&mut self, child: NodeKey, result: Result<Decimal, ResolveIssue>) {
        match result {
            Ok(cost) => self.total += self.pending_quantity * cost,
            Err(cause) => self.issues.push(ResolveIssue::DependencyFailed {
                component: child,
                cause: Box::new(cause),
            }),
        }
        self.pending_quantity = Decimal::ZERO;
    }
}

enum Step {
    Cost(Decimal),
    Fail(ResolveIssue),
    Descend(NodeKey, Decimal),
}

pub struct CostResolver<'g> {
    graph: &'g DependencyGraph,
    config: ResolverConfig,
    index: ItemCostIndex,
    failures: HashMap<NodeKey, Failure>,
    cycles: Vec<Vec<String>>,
    computations: HashMap<NodeKey, usize>,
}

impl<'g> CostResolver<'g> {
    pub fn new(graph: &'g DependencyGraph, config: ResolverConfig) -> Self {
        let mut failures = HashMap::new();
        let mut cycles = Vec::new();

        for members in graph.cycles() {
            let cycle: Vec<String> = members.iter().map(|k| k.item_id.clone()).collect();
            warn!(cycle = %cycle.join(" -> "), "circular dependency detected");
            for key in members {
                let mut issues = vec![ResolveIssue::CircularDependency { cycle: cycle.clone() }];
                issues.extend(graph.duplicate_issues(&key).iter().cloned());
                failures.insert(
                    key,
                    Failure {
                        state: ResolutionState::Circular,
                        issues,
                    },
                );
            }
            cycles.push(cycle);
        }

        Self {
            graph,
            config,
            index: ItemCostIndex::default(),
            failures,
            cycles,
            computations: HashMap::new(),
        }
    }

    /// Seed externally corrected costs; overridden nodes are not walked
    pub fn with_overrides(mut self, overrides: &BTreeMap<NodeKey, Decimal>) -> Self {
        for (key, cost) in overrides {
            self.index.insert(key.clone(), *cost);
        }
        self
    }

    pub fn index(&self) -> &ItemCostIndex {
        &self.index
    }

    pub fn into_index(self) -> ItemCostIndex {
        self.index
    }

    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn state(&self, key: &NodeKey) -> ResolutionState {
        if self.index.contains(key) {
            ResolutionState::Resolved
        } else if let Some(failure) = self.failures.get(key) {
            failure.state
        } else {
            ResolutionState::Pending
        }
    }

    /// Issues recorded against a node that did not resolve
    pub fn issues(&self, key: &NodeKey) -> &[ResolveIssue] {
        self.failures
            .get(key)
            .map(|f| f.issues.as_slice())
            .unwrap_or(&[])
    }

    /// Number of times the weighted sum of a node was computed
    pub fn computation_count(&self, key: &NodeKey) -> usize {
        self.computations.get(key).copied().unwrap_or(0)
    }

    /// Resolve one node and everything it depends on
    pub fn resolve(&mut self, key: &NodeKey) -> Result<Decimal, ResolveIssue> {
        if let Some(cost) = self.index.get(key) {
            return Ok(cost);
        }
        if let Some(failure) = self.failures.get(key) {
            return Err(failure.cause());
        }
        if self.graph.recipe(key).is_none() {
            return Err(ResolveIssue::MissingCost {
                component: key.item_id.clone(),
            });
        }

        let graph = self.graph;
        let mut stack = vec![Frame::new(key.clone())];

        while let Some(top) = stack.last_mut() {
            let lines = graph
                .recipe(&top.key)
                .map(|r| r.lines.as_slice())
                .unwrap_or(&[]);

            if top.next >= lines.len() {
                let Some(frame) = stack.pop() else { break };
                let child = frame.key.clone();
                let result = self.finish(frame);
                match stack.last_mut() {
                    Some(parent) => parent.absorb(child, result),
                    None => return result,
                }
                continue;
            }

            let line = &lines[top.next];
            top.next += 1;

            let step = self.step(line, stack.len());
            let Some(top) = stack.last_mut() else { break };
            match step {
                Step::Cost(cost) => top.total += line.quantity * cost,
                Step::Fail(issue) => top.issues.push(issue),
                Step::Descend(source, quantity) => {
                    top.pending_quantity = quantity;
                    stack.push(Frame::new(source));
                }
            }
        }

        // The root frame always returns from inside the loop
        Err(ResolveIssue::MissingCost {
            component: key.item_id.clone(),
        })
    }

    /// Resolve every node of the graph in key order and report on each
    pub fn resolve_all(&mut self) -> ResolutionReport {
        let graph = self.graph;
        for key in graph.nodes() {
            if let Err(issue) = self.resolve(key) {
                debug!(node = %key, "unresolved: {}", issue);
            }
        }

        let entries: Vec<ReportEntry> = graph
            .nodes()
            .map(|key| {
                let state = self.state(key);
                ReportEntry {
                    key: key.clone(),
                    state,
                    cost: self.index.get(key).map(|c| self.round(c)),
                    reasons: self.issues(key).iter().map(|i| i.to_string()).collect(),
                }
            })
            .collect();

        let report = ResolutionReport::new(
            entries,
            self.cycles.clone(),
            graph.duplicates().map(|(k, i)| (k.clone(), i.to_string())).collect(),
        );
        let counts = report.counts();
        info!(
            resolved = counts.resolved,
            unresolvable = counts.unresolvable,
            circular = counts.circular,
            "cost resolution finished"
        );
        report
    }

    pub fn round(&self, cost: Decimal) -> Decimal {
        cost.round_dp_with_strategy(self.config.output_scale, RoundingStrategy::MidpointAwayFromZero)
    }

    fn step(&self, line: &RecipeLine, depth: usize) -> Step {
        let Some(source) = self.graph.source_node(line) else {
            // Raw, or semi-finished but bought in / produced outside this batch
            return match line.unit_cost {
                Some(cost) => Step::Cost(cost),
                None => Step::Fail(ResolveIssue::MissingCost {
                    component: line.component_item_id.clone(),
                }),
            };
        };

        if let Some(cost) = self.index.get(&source) {
            return Step::Cost(cost);
        }

        if let Some(failure) = self.failures.get(&source) {
            return Step::Fail(ResolveIssue::DependencyFailed {
                component: source,
                cause: Box::new(failure.cause()),
            });
        }

        if depth >= self.config.max_depth {
            return Step::Fail(ResolveIssue::DepthExceeded {
                component: source.to_string(),
                limit: self.config.max_depth,
            });
        }

        Step::Descend(source, line.quantity)
    }

    fn finish(&mut self, frame: Frame) -> Result<Decimal, ResolveIssue> {
        let mut issues = self.graph.duplicate_issues(&frame.key).to_vec();
        issues.extend(frame.issues);

        if issues.is_empty() {
            *self.computations.entry(frame.key.clone()).or_default() += 1;
            debug!(node = %frame.key, cost = %frame.total, "resolved");
            self.index.insert(frame.key, frame.total);
            return Ok(frame.total);
        }

        let failure = Failure {
            state: ResolutionState::Unresolvable,
            issues,
        };
        let cause = failure.cause();
        self.failures.insert(frame.key, failure);
        Err(cause)
    }
}
