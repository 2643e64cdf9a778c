//! Data models for production records and cost resolution

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// One produced item within one manufacturing order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub order_id: String,
    pub item_id: String,
}

impl NodeKey {
    pub fn new(order_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            item_id: item_id.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.item_id, self.order_id)
    }
}

/// One row of consumption: this order consumed this component to make this item
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub order_id: String,
    pub produced_item_id: String,
    pub component_item_id: String,
    pub quantity_consumed: Decimal,
    pub unit_cost: Option<Decimal>, // None while a semi-finished cost is pending
    pub is_semi_finished: bool,
    /// Order that produced this component, when the export links lots to orders
    pub source_order_id: Option<String>,
    pub produced_date: Option<NaiveDate>,
    pub units_produced: Option<Decimal>,
}

impl LineRecord {
    pub fn produced_key(&self) -> NodeKey {
        NodeKey::new(&self.order_id, &self.produced_item_id)
    }
}

/// One line of a produced item's recipe
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeLine {
    pub component_item_id: String,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub is_semi_finished: bool,
    pub source_order_id: Option<String>,
}

/// All components consumed to make one item in one order
#[derive(Debug, Clone, Default)]
pub struct Recipe {
    pub lines: Vec<RecipeLine>,
    pub produced_date: Option<NaiveDate>,
    pub units_produced: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionState {
    Pending,
    Resolved,
    Unresolvable,
    Circular,
}

impl ResolutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionState::Pending => "PENDING",
            ResolutionState::Resolved => "RESOLVED",
            ResolutionState::Unresolvable => "UNRESOLVABLE",
            ResolutionState::Circular => "CIRCULAR",
        }
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchase price of one component lot, after cleaning
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseCost {
    pub component_id: String,
    pub lot_id: String,
    pub unit_cost: Decimal,
}

/// Resolved cost of one manufacturing order, the table handed to charting
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCost {
    pub order_id: String,
    pub date: Option<NaiveDate>,
    pub item_id: String,
    pub units_produced: Option<Decimal>,
    pub unit_cost: Decimal,
}
