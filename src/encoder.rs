//! Composite keys and key-based merging of tables

use std::collections::HashMap;

use tracing::debug;

use crate::error::InputError;
use crate::table::Table;

/// Key built from two values, e.g. item code and lot: `MAT01-0001-002`
pub fn composite_key(a: &str, b: &str) -> String {
    format!("{}-{}", a, b)
}

/// Append a column holding the composite key of columns `a` and `b`
pub fn create_key(table: &Table, a: &str, b: &str, name: &str) -> Result<Table, InputError> {
    let ia = require(table, a)?;
    let ib = require(table, b)?;

    let mut out = table.clone();
    out.headers.push(name.to_string());
    for row in &mut out.rows {
        let key = composite_key(&row[ia], &row[ib]);
        row.push(key);
    }
    Ok(out)
}

/// Left join `right` onto `left` by composite keys
///
/// Every left row is kept. Right columns other than the key are appended;
/// names already used on the left get a `_right` suffix. When the right
/// side repeats a key, its last row wins. Unmatched rows get empty cells.
pub fn merge_left(
    left: &Table,
    right: &Table,
    left_cols: (&str, &str),
    right_cols: (&str, &str),
    key: &str,
) -> Result<Table, InputError> {
    let left = create_key(left, left_cols.0, left_cols.1, key)?;
    let right = create_key(right, right_cols.0, right_cols.1, key)?;
    let left_key = require(&left, key)?;
    let right_key = require(&right, key)?;

    let right_columns: Vec<usize> = (0..right.headers.len()).filter(|&i| i != right_key).collect();
    let mut headers = left.headers.clone();
    for &i in &right_columns {
        let name = &right.headers[i];
        if headers.contains(name) {
            headers.push(format!("{}_right", name));
        } else {
            headers.push(name.clone());
        }
    }

    let mut lookup: HashMap<&str, &Vec<String>> = HashMap::new();
    for row in &right.rows {
        lookup.insert(row[right_key].as_str(), row);
    }

    let mut out = Table::new(&left.name, headers);
    let mut matched = 0;
    for row in &left.rows {
        let mut merged = row.clone();
        match lookup.get(row[left_key].as_str()) {
            Some(found) => {
                matched += 1;
                merged.extend(right_columns.iter().map(|&i| found[i].clone()));
            }
            None => merged.extend(right_columns.iter().map(|_| String::new())),
        }
        out.push_row(merged);
    }

    debug!(left = %left.name, right = %right.name, rows = out.len(), matched, "merge_left");
    Ok(out)
}

fn require(table: &Table, column: &str) -> Result<usize, InputError> {
    table.column(column).ok_or_else(|| InputError::MissingColumn {
        table: table.name.clone(),
        column: column.to_string(),
    })
}
