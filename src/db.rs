//! SQLite run history
//!
//! Each `resolve --save` stores one run: its counts, every resolved cost and
//! every item that did not resolve with its reasons.

use anyhow::Result;
use rusqlite::Connection;

use crate::report::ResolutionReport;

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub productions_path: String,
    pub costs_path: String,
    pub resolved: i64,
    pub unresolvable: i64,
    pub circular: i64,
    pub corrected: i64,
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            productions_path TEXT NOT NULL,
            costs_path TEXT NOT NULL,
            resolved INTEGER NOT NULL,
            unresolvable INTEGER NOT NULL,
            circular INTEGER NOT NULL,
            corrected INTEGER NOT NULL
        );

        -- Costs are stored as decimal text to keep exact values
        CREATE TABLE IF NOT EXISTS resolved_costs (
            run_id INTEGER NOT NULL,
            order_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            unit_cost TEXT NOT NULL,
            PRIMARY KEY (run_id, order_id, item_id)
        );

        CREATE TABLE IF NOT EXISTS resolution_issues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL,
            order_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            state TEXT NOT NULL,
            reason TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_resolved_costs_item ON resolved_costs(item_id);
        CREATE INDEX IF NOT EXISTS idx_resolution_issues_run ON resolution_issues(run_id);
        "#,
    )?;
    Ok(())
}

/// Store a finished run and return its id
pub fn insert_run(
    conn: &Connection,
    productions_path: &str,
    costs_path: &str,
    report: &ResolutionReport,
    corrected: usize,
) -> Result<i64> {
    let counts = report.counts();
    conn.execute(
        "INSERT INTO runs (started_at, productions_path, costs_path, resolved, unresolvable, circular, corrected)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            chrono::Utc::now().to_rfc3339(),
            productions_path,
            costs_path,
            counts.resolved as i64,
            counts.unresolvable as i64,
            counts.circular as i64,
            corrected as i64,
        ),
    )?;
    let run_id = conn.last_insert_rowid();

    let mut cost_stmt = conn.prepare(
        "INSERT INTO resolved_costs (run_id, order_id, item_id, unit_cost) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut issue_stmt = conn.prepare(
        "INSERT INTO resolution_issues (run_id, order_id, item_id, state, reason)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for entry in report.entries() {
        if let Some(cost) = entry.cost {
            cost_stmt.execute((run_id, &entry.key.order_id, &entry.key.item_id, cost.to_string()))?;
        }
        for reason in &entry.reasons {
            issue_stmt.execute((
                run_id,
                &entry.key.order_id,
                &entry.key.item_id,
                entry.state.as_str(),
                reason,
            ))?;
        }
    }

    Ok(run_id)
}

/// List stored runs, newest first
pub fn list_runs(conn: &Connection) -> Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, started_at, productions_path, costs_path, resolved, unresolvable, circular, corrected
         FROM runs ORDER BY id DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            productions_path: row.get(2)?,
            costs_path: row.get(3)?,
            resolved: row.get(4)?,
            unresolvable: row.get(5)?,
            circular: row.get(6)?,
            corrected: row.get(7)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Stored cost history of one item across runs: (run id, order id, cost)
pub fn item_history(conn: &Connection, item_id: &str) -> Result<Vec<(i64, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, order_id, unit_cost FROM resolved_costs
         WHERE item_id = ?1 ORDER BY run_id, order_id",
    )?;

    let rows = stmt.query_map([item_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Issues recorded for a run: (order id, item id, state, reason)
pub fn run_issues(conn: &Connection, run_id: i64) -> Result<Vec<(String, String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT order_id, item_id, state, reason FROM resolution_issues
         WHERE run_id = ?1 ORDER BY id",
    )?;

    let rows = stmt.query_map([run_id], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}
