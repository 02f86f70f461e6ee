use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rusqlite::{Connection, OpenFlags};
use table_schema_config::{DatabaseConfig, TableConfig, TableMode};
use table_schema_core::{Table, diff_tables};
use table_schema_sqlite::{
    Database, DatabaseBuilder, list_tables, read_table, table_exists, with_database_extension,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Output format for `inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "table-schema")]
#[command(about = "Declarative SQLite table schemas and migrations")]
struct Cli {
    /// Log reconciliation details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the live schema of a database.
    Inspect(InspectArgs),
    /// Show what a sync would change, without touching the database.
    Diff(DiffArgs),
    /// Reconcile a database with the tables declared in a config file.
    Sync(SyncArgs),
    /// Drop one table from a database.
    Drop(DropArgs),
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Only print this table.
    #[arg(long)]
    table: Option<String>,
    /// Output format.
    #[arg(long, default_value = "yaml")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct DiffArgs {
    /// Database config file (YAML or JSON).
    #[arg(long)]
    config: PathBuf,
}

#[derive(Debug, Args)]
struct SyncArgs {
    /// Database config file (YAML or JSON).
    #[arg(long)]
    config: PathBuf,
}

#[derive(Debug, Args)]
struct DropArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Table to drop.
    #[arg(long)]
    table: String,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Inspect(args) => run_inspect(args),
        Command::Diff(args) => run_diff(args),
        Command::Sync(args) => run_sync(args),
        Command::Drop(args) => run_drop(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// `-v` forces debug output; otherwise `RUST_LOG` applies, defaulting to warn.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(default_filter(true))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(false)))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

fn run_inspect(args: InspectArgs) -> Result<(), String> {
    let (conn, file) = open_existing(&args.db)?;

    let names = match args.table {
        Some(name) => {
            let exists = table_exists(&conn, &name)
                .map_err(|e| format!("Failed to query '{}': {e}", file.display()))?;
            if !exists {
                return Err(format!("Table '{name}' not found in '{}'", file.display()));
            }
            vec![name]
        }
        None => list_tables(&conn)
            .map_err(|e| format!("Failed to list tables in '{}': {e}", file.display()))?,
    };

    let mut tables = Vec::with_capacity(names.len());
    for name in &names {
        let table =
            read_table(&conn, name).map_err(|e| format!("Failed to read table '{name}': {e}"))?;
        tables.push(TableConfig::from_table(&table));
    }

    print!("{}", render_tables(&tables, args.format)?);
    Ok(())
}

fn render_tables(tables: &[TableConfig], format: CliOutputFormat) -> Result<String, String> {
    match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(tables)
            .map(|mut out| {
                out.push('\n');
                out
            })
            .map_err(|e| format!("JSON serialization failed: {e}")),
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(tables).map_err(|e| format!("YAML serialization failed: {e}"))
        }
    }
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

fn run_diff(args: DiffArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let file = with_database_extension(&config.path);
    let conn = if file.exists() {
        Some(open_existing(&file)?.0)
    } else {
        debug!(path = %file.display(), "database does not exist yet");
        None
    };

    for declared in &config.tables {
        let table = declared
            .to_table()
            .map_err(|e| format!("Invalid declaration for table '{}': {e}", declared.name))?;
        let Some(live) = live_table(conn.as_ref(), table.name())? else {
            println!("{}: absent, would be created", table.name());
            continue;
        };
        if declared.mode == TableMode::IfNotExists {
            println!("{}: present, kept as is", table.name());
            continue;
        }

        let diff = diff_tables(&table, &live);
        if diff.is_empty() {
            println!("{}: unchanged", table.name());
        } else {
            println!("{}: {} change(s)", table.name(), diff.change_count());
            for line in diff.to_string().lines() {
                println!("  {line}");
            }
        }
    }
    Ok(())
}

fn live_table(conn: Option<&Connection>, name: &str) -> Result<Option<Table>, String> {
    let Some(conn) = conn else {
        return Ok(None);
    };
    let exists =
        table_exists(conn, name).map_err(|e| format!("Failed to query table '{name}': {e}"))?;
    if !exists {
        return Ok(None);
    }
    read_table(conn, name)
        .map(Some)
        .map_err(|e| format!("Failed to read table '{name}': {e}"))
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

fn run_sync(args: SyncArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let db = DatabaseBuilder::from_config(&config)
        .map_err(|e| format!("Invalid config '{}': {e}", args.config.display()))?
        .build()
        .map_err(|e| format!("Sync failed: {e}"))?;

    for step in db.reconciliations() {
        println!("{}: {}", step.table, step.outcome);
    }
    println!(
        "Sync complete. {} table(s) registered in '{}'.",
        db.tables().count(),
        with_database_extension(&config.path).display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// drop
// ---------------------------------------------------------------------------

fn run_drop(args: DropArgs) -> Result<(), String> {
    let file = with_database_extension(&args.db);
    if !file.exists() {
        return Err(format!("Database '{}' does not exist", file.display()));
    }
    let mut db = Database::builder()
        .path(&file)
        .build()
        .map_err(|e| format!("Failed to open database '{}': {e}", file.display()))?;
    db.drop(&args.table)
        .map_err(|e| format!("Failed to drop table '{}': {e}", args.table))?;
    println!("Dropped table '{}' from '{}'.", args.table, file.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<DatabaseConfig, String> {
    DatabaseConfig::load(path)
        .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))
}

/// Opens an existing database read-only, returning it with its resolved path.
fn open_existing(path: &Path) -> Result<(Connection, PathBuf), String> {
    let file = with_database_extension(path);
    if !file.exists() {
        return Err(format!("Database '{}' does not exist", file.display()));
    }
    let conn = Connection::open_with_flags(&file, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| format!("Failed to open database '{}': {e}", file.display()))?;
    Ok((conn, file))
}
