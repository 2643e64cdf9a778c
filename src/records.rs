//! Typed records built from cleaned tables

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::encoder::composite_key;
use crate::error::InputError;
use crate::models::{LineRecord, PurchaseCost};
use crate::table::Table;

const PRODUCTION_COLUMNS: [&str; 5] = ["order_id", "item", "item_lot", "component", "quantity"];
const COST_COLUMNS: [&str; 3] = ["component", "component_lot", "unit_cost"];

/// Convert cleaned production lines into line records
///
/// `unit_cost` is read when the table has been merged with purchase costs.
/// A semi-finished component's lot is matched against produced lots to find
/// the order that made it.
pub fn line_records(table: &Table, config: &ResolverConfig) -> Result<Vec<LineRecord>, InputError> {
    require_columns(table, &PRODUCTION_COLUMNS)?;

    let mut lot_orders: HashMap<String, String> = HashMap::new();
    for row in &table.rows {
        if let (Some(order), Some(item), Some(lot)) = (
            table.get(row, "order_id"),
            table.get(row, "item"),
            table.get(row, "item_lot"),
        ) {
            lot_orders.insert(composite_key(item, lot), order.to_string());
        }
    }

    let mut records = Vec::with_capacity(table.len());
    for (i, row) in table.rows.iter().enumerate() {
        let row_no = i + 1;
        let component = table.get(row, "component").unwrap_or_default().to_string();
        let quantity = decimal(table, row, row_no, "quantity")?.ok_or_else(|| InputError::MissingValue {
            row: row_no,
            column: "quantity".to_string(),
        })?;
        if quantity < Decimal::ZERO {
            return Err(InputError::NegativeQuantity {
                row: row_no,
                component,
                value: quantity.to_string(),
            });
        }

        let is_semi_finished = component.starts_with(&config.semi_finished_prefix);
        let source_order_id = if is_semi_finished {
            table
                .get(row, "component_lot")
                .and_then(|lot| lot_orders.get(&composite_key(&component, lot)))
                .cloned()
        } else {
            None
        };

        records.push(LineRecord {
            order_id: table.get(row, "order_id").unwrap_or_default().to_string(),
            produced_item_id: table.get(row, "item").unwrap_or_default().to_string(),
            component_item_id: component,
            quantity_consumed: quantity,
            unit_cost: decimal(table, row, row_no, "unit_cost")?,
            is_semi_finished,
            source_order_id,
            produced_date: table.get(row, "produced_date").and_then(parse_date),
            units_produced: decimal(table, row, row_no, "units_produced")?,
        });
    }

    debug!(records = records.len(), "line records built");
    Ok(records)
}

/// Convert cleaned purchase costs into typed rows
pub fn purchase_costs(table: &Table) -> Result<Vec<PurchaseCost>, InputError> {
    require_columns(table, &COST_COLUMNS)?;

    let mut costs = Vec::with_capacity(table.len());
    for (i, row) in table.rows.iter().enumerate() {
        let Some(unit_cost) = decimal(table, row, i + 1, "unit_cost")? else {
            continue;
        };
        costs.push(PurchaseCost {
            component_id: table.get(row, "component").unwrap_or_default().to_string(),
            lot_id: table.get(row, "component_lot").unwrap_or_default().to_string(),
            unit_cost,
        });
    }
    Ok(costs)
}

fn require_columns(table: &Table, columns: &[&str]) -> Result<(), InputError> {
    for column in columns {
        if table.column(column).is_none() {
            return Err(InputError::MissingColumn {
                table: table.name.clone(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn decimal(table: &Table, row: &[String], row_no: usize, column: &str) -> Result<Option<Decimal>, InputError> {
    let Some(value) = table.get(row, column) else {
        return Ok(None);
    };
    Decimal::from_str(value)
        .map(Some)
        .map_err(|_| InputError::InvalidNumber {
            row: row_no,
            column: column.to_string(),
            value: value.to_string(),
        })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn productions(rows: &[&[&str]]) -> Table {
        let headers = [
            "order_id",
            "produced_date",
            "item",
            "item_lot",
            "units_produced",
            "component",
            "component_lot",
            "quantity",
            "unit_cost",
        ];
        let mut t = Table::new("productions", headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.push_row(row.iter().map(|c| c.to_string()).collect());
        }
        t
    }

    #[test]
    fn builds_records_and_links_semi_finished_lots() {
        let table = productions(&[
            &["OF1", "03/01/2024", "SEM01", "0100-001", "50", "MAT01", "0001-001", "3", "2"],
            &["OF2", "2024-01-10", "PT01", "0200-001", "10", "SEM01", "0100-001", "2", ""],
        ]);
        let records = line_records(&table, &ResolverConfig::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert!(!records[0].is_semi_finished);
        assert_eq!(records[0].unit_cost, Some(Decimal::from(2)));
        assert_eq!(records[0].produced_date, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert!(records[1].is_semi_finished);
        assert_eq!(records[1].unit_cost, None);
        assert_eq!(records[1].source_order_id.as_deref(), Some("OF1"));
        assert_eq!(records[1].units_produced, Some(Decimal::from(10)));
    }

    #[test]
    fn negative_quantity_is_fatal() {
        let table = productions(&[&["OF1", "", "PT01", "0100-001", "", "MAT01", "0001-001", "-1", "2"]]);
        assert!(matches!(
            line_records(&table, &ResolverConfig::default()),
            Err(InputError::NegativeQuantity { row: 1, .. })
        ));
    }

    #[test]
    fn empty_quantity_is_fatal() {
        let table = productions(&[
            &["OF1", "", "PT01", "0100-001", "", "MAT01", "0001-001", "1", "2"],
            &["OF1", "", "PT01", "0100-001", "", "MAT02", "0002-001", "", "2"],
        ]);
        let err = line_records(&table, &ResolverConfig::default()).unwrap_err();
        assert!(matches!(err, InputError::MissingValue { row: 2, ref column } if column == "quantity"));
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let table = Table::new("productions", vec!["order_id".to_string()]);
        let err = line_records(&table, &ResolverConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing required column 'item' in productions");
    }

    #[test]
    fn purchase_costs_skip_empty_prices() {
        let mut table = Table::new(
            "costs",
            vec!["component".into(), "unit_cost".into(), "component_lot".into()],
        );
        table.push_row(vec!["MAT01".into(), "2.5".into(), "0001-001".into()]);
        table.push_row(vec!["MAT02".into(), "".into(), "0002-001".into()]);

        let costs = purchase_costs(&table).unwrap();
        assert_eq!(costs.len(), 1);
        assert_eq!(costs[0].unit_cost, Decimal::new(25, 1));
    }
}
