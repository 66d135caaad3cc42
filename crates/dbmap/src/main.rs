//! dbmap CLI
//!
//! Command-line tool for diffing database snapshots and generating DDL scripts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dbmap::prelude::*;

/// Database snapshot diffing and DDL script generation.
#[derive(Parser)]
#[command(name = "dbmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Resolve foreign key targets even when the owning table is missing.
    #[arg(long)]
    independent_foreign_keys: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the DDL script that turns the previous snapshot into the current one.
    Diff {
        /// Current snapshot file.
        #[arg(short, long)]
        current: PathBuf,

        /// Previous snapshot file (an empty database if not specified).
        #[arg(short, long)]
        previous: Option<PathBuf>,

        /// Templates directory (built-in templates if not specified).
        #[arg(short, long, env = "DBMAP_TEMPLATES_DIR")]
        templates: Option<PathBuf>,

        /// Output file (stdout if not specified).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Database type used when the snapshots do not name one.
        #[arg(long, default_value = "MSSQL_2016")]
        database_type: DatabaseType,
    },

    /// List the differences between two snapshots.
    Summary {
        /// Current snapshot file.
        #[arg(short, long)]
        current: PathBuf,

        /// Previous snapshot file (an empty database if not specified).
        #[arg(short, long)]
        previous: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut options = ResolverOptions::new();
    if cli.independent_foreign_keys {
        options = options.with_independent_foreign_keys();
    }
    let resolver = ReferenceResolver::with_options(options);

    match cli.command {
        Commands::Diff {
            current,
            previous,
            templates,
            output,
            database_type,
        } => {
            let current = load_snapshot(&current, &resolver).await?;
            let previous = load_previous(previous.as_deref(), &current, &resolver).await?;

            let database_type = current
                .database_type
                .or(previous.database_type)
                .unwrap_or(database_type);
            let templates = match templates {
                Some(dir) => TemplateSet::from_dir(&dir, database_type)
                    .with_context(|| format!("loading templates from {}", dir.display()))?,
                None => TemplateSet::builtin(database_type),
            };

            let diff = MapComparer::new().compare(&previous, &current)?;
            let script = ScriptGenerator::new(templates).generate(&diff)?;

            match output {
                Some(path) => {
                    tokio::fs::write(&path, script)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!("Wrote script to {}", path.display());
                }
                None => print!("{script}"),
            }
        }

        Commands::Summary { current, previous } => {
            let current = load_snapshot(&current, &resolver).await?;
            let previous = load_previous(previous.as_deref(), &current, &resolver).await?;

            let diff = MapComparer::new().compare(&previous, &current)?;
            print_summary(&diff)?;
        }
    }

    Ok(())
}

/// Prints the entries of a diff, one line per object.
fn print_summary(diff: &Diff<'_>) -> anyhow::Result<()> {
    if diff.is_empty() {
        info!("No changes detected.");
        return Ok(());
    }

    println!("\nChanges:");
    println!("{:-<60}", "");
    for entry in &diff.schemas {
        if let Some(schema) = entry.latest() {
            println!(" {:<8} schema {}", entry.state, schema.name);
        }
    }
    for entry in &diff.tables {
        if let Some(table) = entry.latest() {
            println!(" {:<8} table  {}", entry.state, table.full_name()?);
        }
    }
    for entry in &diff.columns {
        let Some(column) = entry.latest() else {
            continue;
        };
        let table = match column.table() {
            Some(table) => table.full_name()?,
            None => String::from("?"),
        };
        let changes: Vec<_> = entry.changed_properties.iter().map(|p| p.name()).collect();
        if changes.is_empty() {
            println!(" {:<8} column {}.{}", entry.state, table, column.name);
        } else {
            println!(
                " {:<8} column {}.{} ({})",
                entry.state,
                table,
                column.name,
                changes.join(", ")
            );
        }
    }
    println!();
    Ok(())
}

/// Reads a snapshot file and resolves it.
async fn load_snapshot(path: &Path, resolver: &ReferenceResolver) -> anyhow::Result<Snapshot> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let mut snapshot: Snapshot = serde_json::from_str(&json)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    resolver.resolve(&mut snapshot);
    Ok(snapshot)
}

/// Loads the previous snapshot, or an empty snapshot of the current database
/// when no path was given. A given path must exist.
async fn load_previous(
    path: Option<&Path>,
    current: &Snapshot,
    resolver: &ReferenceResolver,
) -> anyhow::Result<Snapshot> {
    if let Some(path) = path {
        return load_snapshot(path, resolver).await;
    }

    info!("No previous snapshot given, diffing against an empty database");
    let mut empty = Snapshot::default();
    empty.database_name.clone_from(&current.database_name);
    empty.database_type = current.database_type;
    Ok(empty)
}
