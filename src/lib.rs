//! Margin Calculator
//!
//! Cleans manufacturing CSV exports and rolls component costs up into a
//! unit cost per produced item and manufacturing order.

pub mod cleaning;
pub mod config;
pub mod db;
pub mod encoder;
pub mod error;
pub mod export;
pub mod graph;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod outliers;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod resolver;
pub mod table;
pub mod transformation;

pub use config::Config;
pub use error::{InputError, ResolveIssue};
pub use graph::DependencyGraph;
pub use models::{LineRecord, NodeKey, ResolutionState};
pub use report::ResolutionReport;
pub use resolver::{CostResolver, ItemCostIndex};
