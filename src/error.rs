//! Error types
//!
//! `ResolveIssue` values are collected per item and reported; they never
//! abort a batch. `InputError` is raised before resolution starts when the
//! input tables are structurally unusable.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::NodeKey;

/// Why an item could not be given a resolved cost
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveIssue {
    #[error("missing raw cost for {component}")]
    MissingCost { component: String },

    #[error("circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("component {component} unresolvable: {cause}")]
    DependencyFailed {
        component: NodeKey,
        cause: Box<ResolveIssue>,
    },

    #[error("maximum resolution depth {limit} exceeded at {component}")]
    DepthExceeded { component: String, limit: usize },

    #[error("ambiguous duplicate recipe line for component {component} in order {order_id}")]
    DuplicateRecipe { order_id: String, component: String },
}

/// Fatal problems with an input table
#[derive(Error, Debug)]
pub enum InputError {
    #[error("missing required column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    #[error("rename key '{column}' is not among the kept columns")]
    RenameNotKept { column: String },

    #[error("row {row}: cannot parse '{value}' in column '{column}' as a number")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: empty required value in column '{column}'")]
    MissingValue { row: usize, column: String },

    #[error("row {row}: negative quantity {value} for component {component}")]
    NegativeQuantity {
        row: usize,
        component: String,
        value: String,
    },

    #[error("{0} has no header row")]
    NoHeaders(PathBuf),

    #[error("invalid regex for column '{column}': {source}")]
    Pattern {
        column: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("delimiter '{0}' is not a single-byte ASCII character")]
    Delimiter(char),
}
