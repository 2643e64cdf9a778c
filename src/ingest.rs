//! CSV export loading and discovery

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::InputError;
use crate::table::Table;

/// Find all CSV exports below a directory, sorted by path
pub fn find_export_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    files
}

/// Read a delimited export into a string table
///
/// Cells are trimmed. Short rows are padded so every row matches the
/// header width.
pub fn read_table(path: &Path, delimiter: u8) -> Result<Table, InputError> {
    let csv_err = |source: csv::Error| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(InputError::NoHeaders(path.to_path_buf()));
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table")
        .to_string();
    let mut table = Table::new(name, headers);

    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        table.push_row(record.iter().map(|c| c.to_string()).collect());
    }

    info!(path = %path.display(), rows = table.len(), "loaded export");
    debug!(columns = ?table.headers, "export columns");
    Ok(table)
}
