//! Dependency graph between produced items
//!
//! Records are grouped by (order, produced item) so each node carries its
//! complete recipe. A semi-finished recipe line points at the node that
//! produced that component, which gives the `component -> produced` edges
//! the resolver walks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::error::ResolveIssue;
use crate::models::{LineRecord, NodeKey, Recipe, RecipeLine};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    recipes: BTreeMap<NodeKey, Recipe>,
    /// item id -> orders producing it, in input order
    producers: BTreeMap<String, Vec<String>>,
    duplicates: BTreeMap<NodeKey, Vec<ResolveIssue>>,
}

impl DependencyGraph {
    /// Build the graph in a single pass over the records
    ///
    /// A repeated (order, produced, component) triple with the same quantity
    /// and cost is dropped. A repeated triple that disagrees is ambiguous:
    /// the first line is kept and the node is flagged with `DuplicateRecipe`.
    pub fn build(records: &[LineRecord]) -> Self {
        let mut graph = DependencyGraph::default();

        for record in records {
            let key = record.produced_key();
            let line = RecipeLine {
                component_item_id: record.component_item_id.clone(),
                quantity: record.quantity_consumed,
                unit_cost: record.unit_cost,
                is_semi_finished: record.is_semi_finished,
                source_order_id: record.source_order_id.clone(),
            };

            if !graph.recipes.contains_key(&key) {
                graph
                    .producers
                    .entry(record.produced_item_id.clone())
                    .or_default()
                    .push(record.order_id.clone());
            }

            let recipe = graph.recipes.entry(key.clone()).or_default();
            if recipe.produced_date.is_none() {
                recipe.produced_date = record.produced_date;
            }
            if recipe.units_produced.is_none() {
                recipe.units_produced = record.units_produced;
            }

            match recipe
                .lines
                .iter()
                .find(|l| l.component_item_id == line.component_item_id)
            {
                None => recipe.lines.push(line),
                Some(existing) if *existing == line => {
                    debug!(node = %key, component = %line.component_item_id, "dropping exact duplicate line");
                }
                Some(_) => {
                    let issue = ResolveIssue::DuplicateRecipe {
                        order_id: record.order_id.clone(),
                        component: line.component_item_id.clone(),
                    };
                    let issues = graph.duplicates.entry(key.clone()).or_default();
                    if !issues.contains(&issue) {
                        warn!(node = %key, "{}", issue);
                        issues.push(issue);
                    }
                }
            }
        }

        debug!(
            nodes = graph.recipes.len(),
            items = graph.producers.len(),
            "dependency graph built"
        );
        graph
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Produced nodes in (order, item) order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeKey> {
        self.recipes.keys()
    }

    pub fn recipe(&self, key: &NodeKey) -> Option<&Recipe> {
        self.recipes.get(key)
    }

    pub fn duplicate_issues(&self, key: &NodeKey) -> &[ResolveIssue] {
        self.duplicates.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn duplicates(&self) -> impl Iterator<Item = (&NodeKey, &ResolveIssue)> {
        self.duplicates
            .iter()
            .flat_map(|(key, issues)| issues.iter().map(move |issue| (key, issue)))
    }

    /// Node whose output a recipe line consumes
    ///
    /// Uses the line's source order when that order produced the item,
    /// otherwise the last order seen producing it. `None` for raw lines and
    /// for semi-finished items nobody in the batch produced.
    pub fn source_node(&self, line: &RecipeLine) -> Option<NodeKey> {
        if !line.is_semi_finished {
            return None;
        }

        if let Some(order) = &line.source_order_id {
            let key = NodeKey::new(order, &line.component_item_id);
            if self.recipes.contains_key(&key) {
                return Some(key);
            }
        }

        self.producers
            .get(&line.component_item_id)
            .and_then(|orders| orders.last())
            .map(|order| NodeKey::new(order, &line.component_item_id))
    }

    /// Nodes that must be resolved before `key`
    pub fn dependencies_of(&self, key: &NodeKey) -> Vec<NodeKey> {
        self.recipes
            .get(key)
            .map(|recipe| recipe.lines.iter().filter_map(|l| self.source_node(l)).collect())
            .unwrap_or_default()
    }

    /// Groups of nodes that depend on each other, each ordered as a path
    ///
    /// Strongly connected components with more than one node, plus nodes
    /// consuming their own output. Found with an iterative Tarjan walk, so
    /// membership does not depend on line order within a recipe.
    pub fn cycles(&self) -> Vec<Vec<NodeKey>> {
        let keys: Vec<&NodeKey> = self.recipes.keys().collect();
        let position: HashMap<&NodeKey, usize> = keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        let adjacency: Vec<Vec<usize>> = keys
            .iter()
            .map(|key| {
                self.dependencies_of(key)
                    .iter()
                    .filter_map(|dep| position.get(dep).copied())
                    .collect()
            })
            .collect();

        let n = keys.len();
        let mut index: Vec<Option<usize>> = vec![None; n];
        let mut low = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut counter = 0;
        let mut components: Vec<Vec<usize>> = Vec::new();

        for root in 0..n {
            if index[root].is_some() {
                continue;
            }
            let mut work = vec![(root, 0usize)];
            while let Some((v, next)) = work.pop() {
                if next == 0 {
                    index[v] = Some(counter);
                    low[v] = counter;
                    counter += 1;
                    stack.push(v);
                    on_stack[v] = true;
                }

                if let Some(&w) = adjacency[v].get(next) {
                    work.push((v, next + 1));
                    match index[w] {
                        None => work.push((w, 0)),
                        Some(iw) if on_stack[w] => low[v] = low[v].min(iw),
                        Some(_) => {}
                    }
                    continue;
                }

                if let Some(&(parent, _)) = work.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if index[v] == Some(low[v]) {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }

        let mut cycles: Vec<Vec<NodeKey>> = components
            .into_iter()
            .filter(|c| c.len() > 1 || adjacency[c[0]].contains(&c[0]))
            .map(|c| {
                let members: BTreeSet<usize> = c.into_iter().collect();
                cycle_path(&members, &adjacency)
                    .into_iter()
                    .map(|i| keys[i].clone())
                    .collect()
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Nodes consuming `item_id` as a semi-finished component
    pub fn dependents_of(&self, item_id: &str) -> Vec<NodeKey> {
        self.recipes
            .iter()
            .filter(|(_, recipe)| {
                recipe
                    .lines
                    .iter()
                    .any(|l| l.is_semi_finished && l.component_item_id == item_id)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Distinct `(component, produced)` item edges, sorted
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .recipes
            .iter()
            .flat_map(|(key, recipe)| {
                recipe
                    .lines
                    .iter()
                    .filter(|l| l.is_semi_finished)
                    .map(move |l| (l.component_item_id.clone(), key.item_id.clone()))
            })
            .collect();
        edges.sort();
        edges.dedup();
        edges
    }
}

/// Order a cycle's members along their dependencies
///
/// Starts at the smallest member and follows the smallest unvisited
/// dependency. When that walk does not close over every member, the members
/// are returned in key order.
fn cycle_path(members: &BTreeSet<usize>, adjacency: &[Vec<usize>]) -> Vec<usize> {
    let Some(&start) = members.first() else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    while path.len() < members.len() {
        let next = adjacency[current]
            .iter()
            .copied()
            .filter(|d| members.contains(d) && !path.contains(d))
            .min();
        match next {
            Some(d) => {
                path.push(d);
                current = d;
            }
            None => break,
        }
    }

    if path.len() == members.len() && adjacency[current].contains(&start) {
        path
    } else {
        members.iter().copied().collect()
    }
}
