//! Resolution report and per-order cost summary

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use crate::graph::DependencyGraph;
use crate::models::{NodeKey, OrderCost, ResolutionState};
use crate::resolver::ItemCostIndex;

/// Outcome for one produced item in one order
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub key: NodeKey,
    pub state: ResolutionState,
    /// Only present when `state` is `Resolved`
    pub cost: Option<Decimal>,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportCounts {
    pub resolved: usize,
    pub unresolvable: usize,
    pub circular: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    entries: Vec<ReportEntry>,
    cycles: Vec<Vec<String>>,
    duplicates: Vec<(NodeKey, String)>,
}

impl ResolutionReport {
    pub fn new(
        entries: Vec<ReportEntry>,
        cycles: Vec<Vec<String>>,
        duplicates: Vec<(NodeKey, String)>,
    ) -> Self {
        Self {
            entries,
            cycles,
            duplicates,
        }
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn duplicates(&self) -> &[(NodeKey, String)] {
        &self.duplicates
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolved(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| e.state == ResolutionState::Resolved)
    }

    /// Entries that ended `Unresolvable` or `Circular`
    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| {
            matches!(
                e.state,
                ResolutionState::Unresolvable | ResolutionState::Circular
            )
        })
    }

    pub fn counts(&self) -> ReportCounts {
        let mut counts = ReportCounts::default();
        for entry in &self.entries {
            match entry.state {
                ResolutionState::Resolved => counts.resolved += 1,
                ResolutionState::Unresolvable => counts.unresolvable += 1,
                ResolutionState::Circular => counts.circular += 1,
                ResolutionState::Pending => counts.pending += 1,
            }
        }
        counts
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.counts();
        writeln!(f, "=== Cost Resolution ===")?;
        writeln!(f, "Items:        {}", self.entries.len())?;
        writeln!(f, "Resolved:     {}", counts.resolved)?;
        writeln!(f, "Unresolvable: {}", counts.unresolvable)?;
        writeln!(f, "Circular:     {}", counts.circular)?;

        if !self.cycles.is_empty() {
            writeln!(f)?;
            writeln!(f, "Cycles:")?;
            for cycle in &self.cycles {
                let mut path = cycle.join(" -> ");
                if let Some(first) = cycle.first() {
                    path.push_str(" -> ");
                    path.push_str(first);
                }
                writeln!(f, "  {}", path)?;
            }
        }

        if counts.unresolvable + counts.circular > 0 {
            writeln!(f)?;
            writeln!(f, "Not resolved:")?;
            for entry in self.failures() {
                writeln!(f, "  {} [{}]", entry.key, entry.state)?;
                for reason in &entry.reasons {
                    writeln!(f, "    {}", reason)?;
                }
            }
        }

        Ok(())
    }
}

/// One row per order with a resolved cost, sorted by date then order id
///
/// Orders whose item did not resolve are left out; the index is the only
/// source of costs so partial sums never reach this table.
pub fn order_costs(graph: &DependencyGraph, index: &ItemCostIndex, scale: u32) -> Vec<OrderCost> {
    let mut rows = Vec::new();
    let mut skipped = 0;

    for key in graph.nodes() {
        let Some(cost) = index.get(key) else {
            skipped += 1;
            continue;
        };
        let recipe = graph.recipe(key);
        rows.push(OrderCost {
            order_id: key.order_id.clone(),
            date: recipe.and_then(|r| r.produced_date),
            item_id: key.item_id.clone(),
            units_produced: recipe.and_then(|r| r.units_produced),
            unit_cost: cost.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero),
        });
    }

    if skipped > 0 {
        warn!(skipped, "orders without a resolved cost left out of the summary");
    }

    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.order_id.cmp(&b.order_id)));
    rows
}
