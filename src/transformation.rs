//! Record of the cleaning steps applied to one table

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::table::Table;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformationStep {
    pub operation: String,
    pub description: String,
    pub rows_before: usize,
    pub rows_after: usize,
}

impl TransformationStep {
    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

/// Shape before and after cleaning, every step in between, and the empty
/// and repeated values left in the final table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformationReport {
    pub name: String,
    /// (rows, columns)
    pub initial_shape: (usize, usize),
    pub final_shape: (usize, usize),
    pub steps: Vec<TransformationStep>,
    pub empty_cells: BTreeMap<String, usize>,
    pub duplicate_values: BTreeMap<String, usize>,
}

impl TransformationReport {
    pub fn new(initial: &Table) -> Self {
        let shape = (initial.len(), initial.headers.len());
        Self {
            name: initial.name.clone(),
            initial_shape: shape,
            final_shape: shape,
            ..Self::default()
        }
    }

    /// Record a step; `after` is the table it produced
    pub fn add_step(&mut self, operation: &str, description: impl Into<String>, rows_before: usize, after: &Table) {
        self.steps.push(TransformationStep {
            operation: operation.to_string(),
            description: description.into(),
            rows_before,
            rows_after: after.len(),
        });
        self.final_shape = (after.len(), after.headers.len());
    }

    /// Count empty cells and repeated values per column of the final table
    pub fn finish(&mut self, table: &Table) {
        self.final_shape = (table.len(), table.headers.len());
        self.empty_cells.clear();
        self.duplicate_values.clear();

        for (idx, header) in table.headers.iter().enumerate() {
            let mut seen = HashSet::new();
            let mut empty = 0;
            let mut repeated = 0;
            for row in &table.rows {
                if row[idx].is_empty() {
                    empty += 1;
                }
                if !seen.insert(row[idx].as_str()) {
                    repeated += 1;
                }
            }
            if empty > 0 {
                self.empty_cells.insert(header.clone(), empty);
            }
            if repeated > 0 {
                self.duplicate_values.insert(header.clone(), repeated);
            }
        }
    }

    pub fn rows_removed(&self) -> usize {
        self.initial_shape.0.saturating_sub(self.final_shape.0)
    }
}

impl fmt::Display for TransformationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} transformations ===", self.name)?;
        writeln!(f, "Initial shape: {:?}", self.initial_shape)?;
        writeln!(f, "Final shape:   {:?}", self.final_shape)?;
        writeln!(f, "Rows removed:  {}", self.rows_removed())?;

        if !self.steps.is_empty() {
            writeln!(f)?;
            writeln!(f, "Steps:")?;
            for (i, step) in self.steps.iter().enumerate() {
                writeln!(
                    f,
                    "  {}. {}: {} ({} -> {} rows)",
                    i + 1,
                    step.operation,
                    step.description,
                    step.rows_before,
                    step.rows_after
                )?;
            }
        }

        if !self.empty_cells.is_empty() {
            writeln!(f)?;
            writeln!(f, "Empty cells per column:")?;
            for (column, count) in &self.empty_cells {
                writeln!(f, "  - {}: {}", column, count)?;
            }
        }

        if !self.duplicate_values.is_empty() {
            writeln!(f)?;
            writeln!(f, "Repeated values per column:")?;
            for (column, count) in &self.duplicate_values {
                writeln!(f, "  - {}: {}", column, count)?;
            }
        }

        Ok(())
    }
}
