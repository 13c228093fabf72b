//! dblayer - schema synchronization and ad-hoc queries for SQLite databases
//!
//! This is the main entry point for the dblayer binary.
//! The actual logic is in the library modules for better testability.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dblayer::config::{ConnectionConfig, Settings, find_connection, load_settings};
use dblayer::db::{Database, SqliteHandler};
use dblayer::export::{self, ExportFormat};
use dblayer::schema::{SchemaEngine, Structure};
use dblayer::sql::formatter::format_script;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dblayer")]
#[command(about = "Schema synchronization and queries for SQLite databases")]
#[command(version)]
struct Cli {
    /// Connection URL (`sqlite:///path/to.db`, `sqlite::memory:`)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Named profile from ~/.dblayer/connections.toml
    #[arg(short, long, global = true)]
    connection: Option<String>,

    /// Database file path
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Include failing SQL in error messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the database in line with a TOML schema manifest
    Apply {
        /// Path to the manifest
        manifest: PathBuf,

        /// Print the statements instead of running them
        #[arg(long)]
        dry_run: bool,
    },

    /// List user tables
    Tables,

    /// Show columns, keys, indexes and references of a table
    Describe { table: String },

    /// Run a query and print its rows
    Query {
        sql: String,

        /// Output format (defaults to the configured one)
        #[arg(short, long, value_enum, ignore_case = true)]
        format: Option<ExportFormat>,
    },

    /// Run a statement and print the affected row count
    Exec { sql: String },

    /// Reclaim free pages when the connection closes
    Vacuum,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings().unwrap_or_else(|e| {
        eprintln!("warning: ignoring settings: {}", e);
        Settings::default()
    });
    setup_logging(&settings.log_filter);

    let config = resolve_connection(&cli, &settings)?;
    let db = SqliteHandler::connect(&config)
        .with_context(|| format!("cannot open {}", config.database))?;

    run(&cli.command, &db, &settings)?;
    db.close()?;
    Ok(())
}

fn setup_logging(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_connection(cli: &Cli, settings: &Settings) -> Result<ConnectionConfig> {
    let config = match (&cli.url, &cli.connection, &cli.database) {
        (Some(url), None, None) => ConnectionConfig::from_url(url)?,
        (None, Some(name), None) => find_connection(name)?,
        (None, None, Some(path)) => ConnectionConfig::sqlite(path.to_string_lossy()),
        (None, None, None) => bail!("no database given; use --url, --connection or --database"),
        _ => bail!("--url, --connection and --database are mutually exclusive"),
    };
    let verbose = cli.verbose || settings.verbose_errors || config.verbose_errors;
    Ok(config.with_verbose_errors(verbose))
}

fn run(command: &Commands, db: &SqliteHandler, settings: &Settings) -> Result<()> {
    match command {
        Commands::Apply { manifest, dry_run } => {
            let structure = Structure::load(manifest)
                .with_context(|| format!("cannot load manifest {}", manifest.display()))?;
            let mut schema = db.schema();
            if *dry_run {
                let report = structure.plan(&mut schema)?;
                let pending = schema.pending_sql();
                if !pending.is_empty() {
                    println!("{}", format_script(&pending));
                }
                println!("-- {}", report);
            } else {
                let report = structure.synchronize(&mut schema)?;
                println!("{} ({} statements)", report, report.statements);
            }
        }
        Commands::Tables => {
            for table in db.schema().list_tables()? {
                println!("{}", table);
            }
        }
        Commands::Describe { table } => describe(db, table)?,
        Commands::Query { sql, format } => {
            let format = format.unwrap_or(settings.output_format);
            let results = db.select(sql)?;
            print!("{}", export::render(&results, format));
        }
        Commands::Exec { sql } => {
            let affected = db.execute(sql)?;
            println!("{} row(s) affected", affected);
        }
        Commands::Vacuum => db.vacuum(None),
    }
    Ok(())
}

fn describe(db: &SqliteHandler, table: &str) -> Result<()> {
    let schema = db.schema();
    let columns = schema.list_columns(table)?;
    if columns.is_empty() {
        bail!("table {} does not exist", table);
    }

    println!("{}", table);
    for (name, column) in columns.iter() {
        let length = column.length.map(|l| format!("({})", l)).unwrap_or_default();
        let default = column
            .default
            .to_sql()
            .map(|d| format!(" default {}", d))
            .unwrap_or_default();
        println!(
            "  {} {}{}{}{}",
            name,
            column.ty,
            length,
            if column.nullable { "" } else { " not null" },
            default
        );
    }
    for key in schema.list_keys(table)? {
        let kind = if key.primary { "primary" } else { "unique" };
        println!("  {} {} ({})", kind, key.name, key.columns.join(", "));
    }
    for index in schema.list_indexes(table)? {
        println!(
            "  index {} {} ({})",
            index.name,
            index.kind.as_str(),
            index.columns.join(", ")
        );
    }
    for reference in schema.list_references(table)? {
        println!(
            "  reference {} ({}) -> {} ({}) on update {} on delete {}",
            reference.name,
            reference.child_columns.join(", "),
            reference.parent_table,
            reference.parent_columns.join(", "),
            reference.on_update,
            reference.on_delete
        );
    }
    Ok(())
}
