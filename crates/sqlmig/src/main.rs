//! sqlmig CLI - apply versioned SQL migrations to a SQLite database exactly once.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlmig_core::{split, MigrationSource, Migrator, RunOptions, Statement, StatementKind};
use sqlmig_files::{DirectorySource, MigrationLock};
use sqlmig_sqlite::SqliteConnection;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sqlmig", about = "Apply versioned SQL migrations exactly once", version)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "SQLMIG_DATABASE", global = true)]
    database: Option<PathBuf>,

    /// Directory holding <id>_<name>.sql files
    #[arg(long, env = "SQLMIG_DIR", default_value = "migrations", global = true)]
    dir: PathBuf,

    /// Fail on malformed migration names, duplicate IDs and unterminated statements
    #[arg(long, env = "SQLMIG_STRICT", global = true)]
    strict: bool,

    /// Do not take the <database>.lock advisory lock
    #[arg(long, global = true)]
    no_lock: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations (the default)
    Up,
    /// Show applied and pending migrations
    Status,
    /// List recorded ledger entries
    History,
    /// Print the statements a migration file splits into
    Split {
        /// Migration file to split
        file: PathBuf,
    },
}

fn database_path(cli: &Cli) -> Result<&Path> {
    match cli.database.as_deref() {
        Some(path) => Ok(path),
        None => bail!("No database given. Pass --database or set SQLMIG_DATABASE."),
    }
}

fn open_database(path: &Path) -> Result<SqliteConnection> {
    SqliteConnection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))
}

fn lock_database(cli: &Cli, path: &Path) -> Result<Option<MigrationLock>> {
    if cli.no_lock {
        return Ok(None);
    }
    let lock_path = MigrationLock::path_for(path);
    if let Some(lock) = MigrationLock::try_acquire(&lock_path)
        .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?
    {
        return Ok(Some(lock));
    }
    eprintln!("Waiting for migration lock {}...", lock_path.display());
    let lock = MigrationLock::acquire(&lock_path)
        .with_context(|| format!("Failed to acquire lock {}", lock_path.display()))?;
    Ok(Some(lock))
}

#[derive(Serialize)]
struct SplitOutput<'a> {
    statements: &'a [Statement],
    remainder: Option<&'a str>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn split_file(file: &Path, json_output: bool) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut statements = split(&text);
    let collected: Vec<_> = statements.by_ref().collect();
    let remainder = statements.remainder();

    if json_output {
        return print_json(&SplitOutput {
            statements: &collected,
            remainder,
        });
    }

    for (i, statement) in collected.iter().enumerate() {
        let kind = match statement.kind {
            StatementKind::Simple => "statement",
            StatementKind::Block => "block",
        };
        println!("-- {} {} (line {})", kind, i + 1, statement.line);
        println!("{}\n", statement.sql);
    }
    if let Some(fragment) = remainder {
        eprintln!("Unterminated trailing statement (not executed):\n{}", fragment);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Some(Commands::Split { file }) = &cli.command {
        return split_file(file, cli.json);
    }

    let db_path = database_path(&cli)?;
    let conn = open_database(db_path)?;
    let migrator = Migrator::new(&conn)?.with_options(RunOptions { strict: cli.strict });
    let source = DirectorySource::new(&cli.dir);
    log::debug!(
        "using {} dialect, migrations from {}",
        migrator.dialect().name(),
        source.location()
    );

    match cli.command.as_ref().unwrap_or(&Commands::Up) {
        Commands::Split { .. } => unreachable!(),

        Commands::Up => {
            let _lock = lock_database(&cli, db_path)?;
            let report = migrator.run(&source).with_context(|| {
                format!(
                    "Migrating {} from {} failed",
                    db_path.display(),
                    cli.dir.display()
                )
            })?;

            if cli.json {
                print_json(&report)?;
            } else if report.applied.is_empty() {
                println!("Database is up to date ({} applied)", report.skipped.len());
            } else {
                for migration in &report.applied {
                    let note = if migration.recorded {
                        ""
                    } else {
                        ", already recorded by another runner"
                    };
                    println!(
                        "Applied {} ({} statements{})",
                        migration.file, migration.statements, note
                    );
                }
            }
        }

        Commands::Status => {
            let status = migrator.status(&source)?;
            if cli.json {
                print_json(&status)?;
            } else {
                for entry in &status {
                    let state = if entry.applied { "applied" } else { "pending" };
                    println!("{:<8} {:<12} {}", state, entry.file.id, entry.file.name);
                }
                let pending = status.iter().filter(|s| !s.applied).count();
                println!("[{} pending / {} total]", pending, status.len());
            }
        }

        Commands::History => {
            let entries = migrator.history()?;
            if cli.json {
                print_json(&entries)?;
            } else {
                for entry in &entries {
                    println!("{}: {}", entry.migration_id, entry.executed_at);
                }
            }
        }
    }

    Ok(())
}
