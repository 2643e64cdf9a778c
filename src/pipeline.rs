//! End-to-end run over a production export and a purchase-cost export

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cleaning::{self, ValidationSummary};
use crate::config::Config;
use crate::encoder;
use crate::graph::DependencyGraph;
use crate::ingest;
use crate::models::{LineRecord, OrderCost};
use crate::outliers::{Observation, OutlierAdjuster, OutlierSummary};
use crate::records;
use crate::report::{self, ResolutionReport};
use crate::resolver::{CostResolver, ItemCostIndex};
use crate::table::Table;
use crate::transformation::TransformationReport;

const MERGE_KEY: &str = "merge_key";

/// What cleaning did to one export
#[derive(Debug, Clone)]
pub struct CleaningDiagnostics {
    pub validation: ValidationSummary,
    pub transformations: TransformationReport,
}

impl From<cleaning::Validated> for CleaningDiagnostics {
    fn from(validated: cleaning::Validated) -> Self {
        Self {
            validation: validated.summary,
            transformations: validated.report,
        }
    }
}

/// Everything a run produces
#[derive(Debug)]
pub struct RunOutput {
    pub costs: CleaningDiagnostics,
    pub productions: CleaningDiagnostics,
    pub purchase_outliers: OutlierSummary,
    pub order_outliers: OutlierSummary,
    /// Nodes whose cost was replaced by the outlier pass and fed back
    pub corrected: usize,
    pub report: ResolutionReport,
    pub index: ItemCostIndex,
    pub order_costs: Vec<OrderCost>,
}

/// Load, clean and outlier-adjust the purchase-cost export
pub fn load_purchase_costs(path: &Path, config: &Config) -> Result<(Table, CleaningDiagnostics, OutlierSummary)> {
    let raw = ingest::read_table(path, config.delimiter_byte()?)?;
    let mut validated = cleaning::clean(&raw, &config.costs)
        .with_context(|| format!("Failed to clean {}", path.display()))?;
    let mut table = std::mem::take(&mut validated.table);

    let costs = records::purchase_costs(&table)?;
    let observations: Vec<Observation> = costs
        .iter()
        .map(|c| Observation {
            group: c.component_id.clone(),
            value: c.unit_cost,
        })
        .collect();
    let adjusted = OutlierAdjuster::new(config.outliers.clone()).process(&observations);

    // purchase_costs skips rows without a price, so map adjusted values back by lot
    let by_lot: BTreeMap<(String, String), String> = costs
        .iter()
        .zip(&adjusted.values)
        .map(|(c, v)| ((c.component_id.clone(), c.lot_id.clone()), v.to_string()))
        .collect();
    if let (Some(ic), Some(il), Some(iv)) = (
        table.column("component"),
        table.column("component_lot"),
        table.column("unit_cost"),
    ) {
        for row in &mut table.rows {
            if let Some(value) = by_lot.get(&(row[ic].clone(), row[il].clone())) {
                row[iv] = value.clone();
            }
        }
    }

    Ok((table, validated.into(), adjusted.summary))
}

/// Load and clean the production export, then attach purchase costs
pub fn load_line_records(
    path: &Path,
    costs: &Table,
    config: &Config,
) -> Result<(Vec<LineRecord>, CleaningDiagnostics)> {
    let raw = ingest::read_table(path, config.delimiter_byte()?)?;
    let validated = cleaning::clean(&raw, &config.productions)
        .with_context(|| format!("Failed to clean {}", path.display()))?;

    let merged = encoder::merge_left(
        &validated.table,
        costs,
        ("component", "component_lot"),
        ("component", "component_lot"),
        MERGE_KEY,
    )?;
    let records = records::line_records(&merged, &config.resolver)?;
    Ok((records, validated.into()))
}

/// Costs of one batch after the outlier feedback pass
#[derive(Debug)]
pub struct Resolution {
    pub report: ResolutionReport,
    pub index: ItemCostIndex,
    pub outliers: OutlierSummary,
    /// Nodes whose cost was replaced by the outlier pass and fed back
    pub corrected: usize,
}

/// Resolve a batch, adjust outlying order costs and re-resolve with the
/// corrected costs fed back
///
/// The second pass starts from an empty index; only the corrected nodes are
/// seeded.
pub fn resolve_with_feedback(graph: &DependencyGraph, config: &Config) -> Resolution {
    let mut first = CostResolver::new(graph, config.resolver.clone());
    let report = first.resolve_all();

    let (overrides, outliers) = OutlierAdjuster::new(config.outliers.clone()).corrected_costs(first.index());
    if overrides.is_empty() {
        return Resolution {
            report,
            index: first.into_index(),
            outliers,
            corrected: 0,
        };
    }

    info!(corrected = overrides.len(), "re-resolving with corrected costs");
    let mut second = CostResolver::new(graph, config.resolver.clone()).with_overrides(&overrides);
    let report = second.resolve_all();
    Resolution {
        report,
        index: second.into_index(),
        outliers,
        corrected: overrides.len(),
    }
}

/// Full run: both exports in, resolved costs and diagnostics out
pub fn run(productions: &Path, costs: &Path, config: &Config) -> Result<RunOutput> {
    let (cost_table, cost_diagnostics, purchase_outliers) = load_purchase_costs(costs, config)?;
    let (records, production_diagnostics) = load_line_records(productions, &cost_table, config)?;

    let graph = DependencyGraph::build(&records);
    let resolution = resolve_with_feedback(&graph, config);
    let failures = resolution.report.failures().count();
    if failures > 0 {
        warn!(failures, "some items could not be costed");
    }

    let order_costs = report::order_costs(&graph, &resolution.index, config.resolver.output_scale);

    Ok(RunOutput {
        costs: cost_diagnostics,
        productions: production_diagnostics,
        purchase_outliers,
        order_outliers: resolution.outliers,
        corrected: resolution.corrected,
        report: resolution.report,
        index: resolution.index,
        order_costs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlierConfig;
    use crate::graph::tests::line;
    use crate::models::NodeKey;
    use rust_decimal::Decimal;

    /// Eleven SEM01 orders at 10 and one at 100, the spike consumed by PT01
    fn spiked_batch() -> DependencyGraph {
        let mut records: Vec<LineRecord> = (0..11)
            .map(|i| line(&format!("OF{i:02}"), "SEM01", "MAT01", 1, Some(10)))
            .collect();
        records.push(line("OF99", "SEM01", "MAT01", 10, Some(10)));

        let mut consumer = line("OF200", "PT01", "SEM01", 2, None);
        consumer.source_order_id = Some("OF99".to_string());
        records.push(consumer);

        DependencyGraph::build(&records)
    }

    #[test]
    fn corrected_costs_flow_into_consumers() {
        let graph = spiked_batch();
        let config = Config {
            outliers: OutlierConfig {
                min_outliers: 0,
                ..OutlierConfig::default()
            },
            ..Config::default()
        };

        let resolution = resolve_with_feedback(&graph, &config);

        assert_eq!(resolution.corrected, 1);
        assert_eq!(resolution.outliers.replaced_outliers, 1);
        assert_eq!(resolution.index.get(&NodeKey::new("OF99", "SEM01")), Some(Decimal::from(10)));
        assert_eq!(resolution.index.get(&NodeKey::new("OF200", "PT01")), Some(Decimal::from(20)));
        assert_eq!(resolution.report.counts().resolved, 13);
    }

    #[test]
    fn few_outliers_leave_costs_untouched() {
        let graph = spiked_batch();

        let resolution = resolve_with_feedback(&graph, &Config::default());

        assert_eq!(resolution.corrected, 0);
        assert_eq!(resolution.outliers.remaining_outliers, 1);
        assert_eq!(resolution.index.get(&NodeKey::new("OF99", "SEM01")), Some(Decimal::from(100)));
        assert_eq!(resolution.index.get(&NodeKey::new("OF200", "PT01")), Some(Decimal::from(200)));
    }
}
