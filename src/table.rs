//! In-memory string table loaded from a CSV export
//!
//! Cells are kept as trimmed strings; an empty cell is a missing value.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the header width
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell value, `None` when the column is unknown or the cell is empty
    pub fn get<'a>(&'a self, row: &'a [String], column: &str) -> Option<&'a str> {
        self.column(column)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Same table shape with a different set of rows
    pub fn with_rows(&self, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows,
        }
    }
}
