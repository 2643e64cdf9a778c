//! Output tables for charting and later analysis

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::OrderCost;

#[derive(Debug, Serialize)]
struct OrderCostRow<'a> {
    order_id: &'a str,
    date: String,
    item_id: &'a str,
    units: String,
    unit_cost: String,
}

/// Write per-order resolved costs, one row per order, in the given order
pub fn write_order_costs(path: &Path, rows: &[OrderCost], delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for row in rows {
        writer.serialize(OrderCostRow {
            order_id: &row.order_id,
            date: row.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            item_id: &row.item_id,
            units: row.units_produced.map(|u| u.normalize().to_string()).unwrap_or_default(),
            unit_cost: row.unit_cost.to_string(),
        })?;
    }
    writer.flush()?;
    Ok(())
}
