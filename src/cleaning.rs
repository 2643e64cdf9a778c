//! Column and row cleaning for exported tables
//!
//! Each step is a free function taking a table and returning a new one, so
//! callers compose exactly the steps a dataset needs.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::DatasetParams;
use crate::error::InputError;
use crate::table::Table;
use crate::transformation::TransformationReport;

/// Keep only `cols` (in that order) and rename them through `rename`
pub fn keep_and_rename(
    table: &Table,
    cols: &[String],
    rename: &BTreeMap<String, String>,
) -> Result<Table, InputError> {
    if let Some(key) = rename.keys().find(|k| !cols.contains(k)) {
        return Err(InputError::RenameNotKept { column: key.clone() });
    }

    let mut indices = Vec::with_capacity(cols.len());
    for col in cols {
        let idx = table.column(col).ok_or_else(|| InputError::MissingColumn {
            table: table.name.clone(),
            column: col.clone(),
        })?;
        indices.push(idx);
    }

    let headers = cols
        .iter()
        .map(|c| rename.get(c).unwrap_or(c).clone())
        .collect();
    let mut out = Table::new(&table.name, headers);
    for row in &table.rows {
        out.push_row(indices.iter().map(|&i| row[i].clone()).collect());
    }
    Ok(out)
}

/// Drop rows with an empty cell in any of `subset` (all columns if empty)
pub fn drop_na(table: &Table, subset: &[String]) -> Table {
    let indices: Vec<usize> = if subset.is_empty() {
        (0..table.headers.len()).collect()
    } else {
        subset.iter().filter_map(|c| table.column(c)).collect()
    };

    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .filter(|row| indices.iter().all(|&i| !row[i].is_empty()))
        .cloned()
        .collect();

    debug!(table = %table.name, dropped = table.len() - rows.len(), "drop_na");
    table.with_rows(rows)
}

/// Drop rows repeating a value of `column`, keeping the last occurrence
///
/// Repeated lots come from price corrections in the purchasing system, and
/// the last entry carries the corrected price.
pub fn drop_duplicates_keep_last(table: &Table, column: &str) -> Result<Table, InputError> {
    let idx = table.column(column).ok_or_else(|| InputError::MissingColumn {
        table: table.name.clone(),
        column: column.to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .rev()
        .filter(|row| seen.insert(row[idx].clone()))
        .cloned()
        .collect();
    rows.reverse();

    debug!(table = %table.name, column, dropped = table.len() - rows.len(), "drop_duplicates");
    Ok(table.with_rows(rows))
}

/// Turn `1.234,56` style numbers into `1234.56`
///
/// Empty cells stay empty. Anything that is still not a number afterwards
/// is an error naming the row.
pub fn fix_numeric_format(table: &Table, cols: &[String]) -> Result<Table, InputError> {
    let mut out = table.clone();
    for col in cols {
        let Some(idx) = table.column(col) else {
            return Err(InputError::MissingColumn {
                table: table.name.clone(),
                column: col.clone(),
            });
        };
        for (row_no, row) in out.rows.iter_mut().enumerate() {
            if row[idx].is_empty() {
                continue;
            }
            let normalized = row[idx].replace('.', "").replace(',', ".");
            if Decimal::from_str(&normalized).is_err() {
                return Err(InputError::InvalidNumber {
                    row: row_no + 1,
                    column: col.clone(),
                    value: row[idx].clone(),
                });
            }
            row[idx] = normalized;
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSummary {
    pub initial_size: usize,
    pub final_size: usize,
    pub invalid_rows_by_column: BTreeMap<String, usize>,
}

impl fmt::Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Validation ===")?;
        writeln!(f, "Initial rows: {}", self.initial_size)?;
        for (column, count) in &self.invalid_rows_by_column {
            writeln!(f, "  {}: {} invalid", column, count)?;
        }
        writeln!(f, "Final rows:   {}", self.final_size)?;
        writeln!(f, "Removed:      {}", self.initial_size - self.final_size)
    }
}

/// Outcome of regex validation: the kept table plus the rejected rows
#[derive(Debug, Clone)]
pub struct Validated {
    pub table: Table,
    pub invalid: BTreeMap<String, Vec<Vec<String>>>,
    pub summary: ValidationSummary,
    pub report: TransformationReport,
}

impl Validated {
    pub fn invalid_rows(&self, column: &str) -> &[Vec<String>] {
        self.invalid.get(column).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Remove rows whose value in a mapped column does not fully match its pattern
///
/// Columns absent from the table are skipped. Columns are checked in map
/// order and each check sees only the rows that survived the previous ones.
pub fn validate_with_map(table: &Table, map: &BTreeMap<String, String>) -> Result<Validated, InputError> {
    let mut current = table.clone();
    let mut invalid = BTreeMap::new();
    let mut summary = ValidationSummary {
        initial_size: table.len(),
        ..ValidationSummary::default()
    };

    for (column, pattern) in map {
        let Some(idx) = current.column(column) else {
            continue;
        };
        let re = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| InputError::Pattern {
            column: column.clone(),
            source,
        })?;

        let (kept, rejected): (Vec<_>, Vec<_>) = current
            .rows
            .into_iter()
            .partition(|row| re.is_match(&row[idx]));

        summary
            .invalid_rows_by_column
            .insert(column.clone(), rejected.len());
        if !rejected.is_empty() {
            invalid.insert(column.clone(), rejected);
        }
        current.rows = kept;
    }

    summary.final_size = current.len();
    info!(
        table = %table.name,
        initial = summary.initial_size,
        remaining = summary.final_size,
        "validation finished"
    );

    let mut report = TransformationReport::new(table);
    report.add_step(
        "validate_patterns",
        format!("removed rows not matching {} patterns", map.len()),
        summary.initial_size,
        &current,
    );
    report.finish(&current);

    Ok(Validated {
        table: current,
        invalid,
        summary,
        report,
    })
}

/// Apply every cleaning step a dataset's parameters ask for
///
/// Order: keep/rename, drop missing, numeric fix, validation, dedupe.
pub fn clean(table: &Table, params: &DatasetParams) -> Result<Validated, InputError> {
    let mut report = TransformationReport::new(table);

    let kept = keep_and_rename(table, &params.cols_to_keep, &params.rename_map)?;
    report.add_step(
        "keep_and_rename",
        format!(
            "kept {} of {} columns, renamed {}",
            kept.headers.len(),
            table.headers.len(),
            params.rename_map.len()
        ),
        table.len(),
        &kept,
    );

    let present = if params.drop_na_subset.is_empty() {
        kept
    } else {
        let present = drop_na(&kept, &params.drop_na_subset);
        report.add_step(
            "drop_na",
            format!("dropped rows with empty {}", params.drop_na_subset.join(", ")),
            kept.len(),
            &present,
        );
        present
    };

    let numeric = fix_numeric_format(&present, &params.numeric_columns)?;
    if !params.numeric_columns.is_empty() {
        report.add_step(
            "fix_numeric_format",
            format!("normalized decimals in {}", params.numeric_columns.join(", ")),
            present.len(),
            &numeric,
        );
    }

    let mut validated = validate_with_map(&numeric, &params.validation_map)?;
    if !params.validation_map.is_empty() {
        let columns: Vec<&str> = params.validation_map.keys().map(String::as_str).collect();
        report.add_step(
            "validate_patterns",
            format!("removed rows with invalid {}", columns.join(", ")),
            numeric.len(),
            &validated.table,
        );
    }

    if let Some(column) = &params.drop_duplicates_on {
        let deduped = drop_duplicates_keep_last(&validated.table, column)?;
        report.add_step(
            "drop_duplicates",
            format!("kept the last row per {}", column),
            validated.table.len(),
            &deduped,
        );
        validated.table = deduped;
    }

    report.finish(&validated.table);
    validated.report = report;
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new("test", headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.push_row(row.iter().map(|c| c.to_string()).collect());
        }
        t
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keep_and_rename_reorders_and_renames() {
        let t = table(&["a", "b", "c"], &[&["1", "2", "3"]]);
        let rename = BTreeMap::from([("c".to_string(), "z".to_string())]);
        let out = keep_and_rename(&t, &strings(&["c", "a"]), &rename).unwrap();

        assert_eq!(out.headers, vec!["z", "a"]);
        assert_eq!(out.rows[0], vec!["3", "1"]);
    }

    #[test]
    fn keep_and_rename_rejects_bad_input() {
        let t = table(&["a"], &[]);
        let rename = BTreeMap::from([("b".to_string(), "x".to_string())]);
        assert!(matches!(
            keep_and_rename(&t, &strings(&["a"]), &rename),
            Err(InputError::RenameNotKept { .. })
        ));
        assert!(matches!(
            keep_and_rename(&t, &strings(&["missing"]), &BTreeMap::new()),
            Err(InputError::MissingColumn { .. })
        ));
    }

    #[test]
    fn drop_na_on_subset() {
        let t = table(&["a", "b"], &[&["1", ""], &["", "2"], &["3", "4"]]);
        assert_eq!(drop_na(&t, &strings(&["a"])).len(), 2);
        assert_eq!(drop_na(&t, &[]).len(), 1);
    }

    #[test]
    fn duplicates_keep_last_occurrence() {
        let t = table(
            &["lot", "price"],
            &[&["0001-001", "5"], &["0001-002", "6"], &["0001-001", "7"]],
        );
        let out = drop_duplicates_keep_last(&t, "lot").unwrap();

        assert_eq!(out.rows, vec![strings(&["0001-002", "6"]), strings(&["0001-001", "7"])]);
    }

    #[test]
    fn european_numbers_are_normalized() {
        let t = table(&["price"], &[&["1.234,56"], &["7"], &[""]]);
        let out = fix_numeric_format(&t, &strings(&["price"])).unwrap();
        assert_eq!(out.rows, vec![strings(&["1234.56"]), strings(&["7"]), strings(&[""])]);

        let bad = table(&["price"], &[&["1"], &["abc"]]);
        let err = fix_numeric_format(&bad, &strings(&["price"])).unwrap_err();
        assert!(err.to_string().starts_with("row 2"), "{err}");
    }

    #[test]
    fn validation_removes_and_keeps_invalid_rows() {
        let t = table(
            &["component", "lot"],
            &[
                &["MAT01", "1234-567"],
                &["MAT1", "1234-567"],
                &["MAUX120", "12-5"],
                &["SEMÁ05", "0001-002"],
            ],
        );
        let map = BTreeMap::from([
            ("component".to_string(), r"^[A-Za-zÀ-ÖØ-öø-ÿ]+[0-9]{2,3}$".to_string()),
            ("lot".to_string(), r"^[0-9]{4}-[0-9]{3}$".to_string()),
            ("absent".to_string(), ".*".to_string()),
        ]);
        let validated = validate_with_map(&t, &map).unwrap();

        assert_eq!(validated.table.len(), 2);
        assert_eq!(validated.invalid_rows("component"), &[strings(&["MAT1", "1234-567"])]);
        assert_eq!(validated.invalid_rows("lot"), &[strings(&["MAUX120", "12-5"])]);
        assert_eq!(validated.summary.initial_size, 4);
        assert_eq!(validated.summary.final_size, 2);
        assert!(!validated.summary.invalid_rows_by_column.contains_key("absent"));
    }

    #[test]
    fn clean_applies_dataset_params() {
        let raw = table(
            &["Cód. artículo", "PRCMONEDA", "LOTEINTERNO", "NOMPRO"],
            &[
                &["MAT01", "1,5", "0001-001", "acme"],
                &["MAT01", "", "0001-002", "acme"],
                &["MAT01", "2,5", "0001-001", "acme"],
                &["??", "3", "0001-003", "acme"],
            ],
        );
        let validated = clean(&raw, &DatasetParams::costs()).unwrap();

        assert_eq!(validated.table.headers, vec!["component", "unit_cost", "component_lot"]);
        assert_eq!(validated.table.rows, vec![strings(&["MAT01", "2.5", "0001-001"])]);
        assert_eq!(validated.summary.invalid_rows_by_column["component"], 1);
    }

    #[test]
    fn clean_reports_every_step() {
        let raw = table(
            &["Cód. artículo", "PRCMONEDA", "LOTEINTERNO", "NOMPRO"],
            &[
                &["MAT01", "1,5", "0001-001", "acme"],
                &["MAT01", "", "0001-002", "acme"],
                &["MAT01", "2,5", "0001-001", "acme"],
                &["??", "3", "0001-003", "acme"],
            ],
        );
        let validated = clean(&raw, &DatasetParams::costs()).unwrap();
        let report = &validated.report;

        let steps: Vec<(&str, usize, usize)> = report
            .steps
            .iter()
            .map(|s| (s.operation.as_str(), s.rows_before, s.rows_after))
            .collect();
        assert_eq!(
            steps,
            vec![
                ("keep_and_rename", 4, 4),
                ("drop_na", 4, 3),
                ("fix_numeric_format", 3, 3),
                ("validate_patterns", 3, 2),
                ("drop_duplicates", 2, 1),
            ]
        );
        assert_eq!(report.initial_shape, (4, 4));
        assert_eq!(report.final_shape, (1, 3));
        assert_eq!(report.rows_removed(), 3);
    }
}
