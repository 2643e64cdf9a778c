//! Margin Calculator
//!
//! Cost roll-up for manufacturing CSV exports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use margin_calculator::{Config, cleaning, db, export, ingest, logging, pipeline};

#[derive(Parser)]
#[command(name = "margin-calculator")]
#[command(about = "Cost roll-up and data cleaning for manufacturing CSV exports")]
struct Cli {
    /// Path to the SQLite run history
    #[arg(short, long, default_value = "margin_runs.db")]
    database: PathBuf,

    /// TOML file overriding the default column and resolver settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve unit costs for every order in a production export
    Resolve {
        /// Production export (one consumed component per row)
        productions: PathBuf,

        /// Purchase-cost export (one price per component lot)
        costs: PathBuf,

        /// Write per-order costs to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Store the run in the database
        #[arg(long)]
        save: bool,

        /// Also print cleaning, validation and outlier summaries
        #[arg(long)]
        report: bool,
    },

    /// Clean and validate both exports without resolving
    Validate {
        productions: PathBuf,
        costs: PathBuf,
    },

    /// List CSV exports under a directory
    Scan { dir: PathBuf },

    /// List stored runs
    Runs,

    /// Show the stored cost history of one item
    History { item: String },

    /// Show why items of a stored run did not resolve
    Issues { run_id: i64 },

    /// Initialize empty database with schema
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Resolve {
            productions,
            costs,
            output,
            save,
            report,
        } => {
            let run = pipeline::run(&productions, &costs, &config)?;

            if report {
                for diagnostics in [&run.costs, &run.productions] {
                    println!("{}", diagnostics.transformations);
                    println!("{}", diagnostics.validation);
                }
                println!("{}", run.purchase_outliers);
                println!("{}", run.order_outliers);
            }
            println!("{}", run.report);
            if run.corrected > 0 {
                println!("Costs corrected by outlier pass: {}", run.corrected);
            }

            if let Some(path) = output {
                export::write_order_costs(&path, &run.order_costs, config.delimiter_byte()?)?;
                println!("Wrote {} order costs to {}", run.order_costs.len(), path.display());
            }

            if save {
                let conn = open_database(&cli.database)?;
                let run_id = db::insert_run(
                    &conn,
                    &productions.display().to_string(),
                    &costs.display().to_string(),
                    &run.report,
                    run.corrected,
                )?;
                println!("Saved run {} to {}", run_id, cli.database.display());
            }
        }

        Commands::Validate { productions, costs } => {
            for (path, params) in [(&costs, &config.costs), (&productions, &config.productions)] {
                let table = ingest::read_table(path, config.delimiter_byte()?)?;
                let validated = cleaning::clean(&table, params)
                    .with_context(|| format!("Failed to clean {}", path.display()))?;
                println!("{}", path.display());
                println!("{}", validated.report);
                println!("{}", validated.summary);
                for (column, rows) in &validated.invalid {
                    for row in rows.iter().take(5) {
                        println!("  invalid {}: {}", column, row.join(";"));
                    }
                }
            }
        }

        Commands::Scan { dir } => {
            let files = ingest::find_export_files(&dir);
            if files.is_empty() {
                println!("No CSV exports found under {}", dir.display());
            } else {
                for file in files {
                    println!("  {}", file.display());
                }
            }
        }

        Commands::Runs => {
            let conn = open_database(&cli.database)?;
            let runs = db::list_runs(&conn)?;
            if runs.is_empty() {
                println!("No runs stored. Run 'resolve --save' first.");
            } else {
                println!(
                    "{:>5} {:<26} {:>9} {:>13} {:>9} {:>10}",
                    "Run", "Started", "Resolved", "Unresolvable", "Circular", "Corrected"
                );
                println!("{}", "-".repeat(77));
                for r in runs {
                    println!(
                        "{:>5} {:<26} {:>9} {:>13} {:>9} {:>10}",
                        r.id, r.started_at, r.resolved, r.unresolvable, r.circular, r.corrected
                    );
                }
            }
        }

        Commands::History { item } => {
            let conn = open_database(&cli.database)?;
            let history = db::item_history(&conn, &item)?;
            if history.is_empty() {
                println!("No stored costs for '{}'", item);
            } else {
                for (run_id, order_id, cost) in history {
                    println!("  run {:>4}  {:<12} {}", run_id, order_id, cost);
                }
            }
        }

        Commands::Issues { run_id } => {
            let conn = open_database(&cli.database)?;
            let issues = db::run_issues(&conn, run_id)?;
            if issues.is_empty() {
                println!("No issues stored for run {}", run_id);
            } else {
                for (order_id, item_id, state, reason) in issues {
                    println!("  {}@{} [{}] {}", item_id, order_id, state, reason);
                }
            }
        }

        Commands::Init => {
            open_database(&cli.database)?;
            println!("Database initialized at: {}", cli.database.display());
        }
    }

    Ok(())
}

fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    db::init_schema(&conn)?;
    Ok(conn)
}
