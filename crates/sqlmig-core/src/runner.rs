//! Migration runner: discovers candidate files, consults the ledger, executes
//! each file's statements in order and records the file as applied.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::Connection;
use crate::dialect::Dialect;
use crate::error::Error;
use crate::ledger::{Ledger, LedgerEntry};
use crate::migration::{compare_ids, is_sql_file, MigrationFile, MigrationSource};
use crate::splitter::{split, Statement};

/// Knobs for a migration run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunOptions {
    /// Reject malformed input instead of skipping it: `.sql` names without a
    /// migration ID, duplicate IDs and unterminated trailing statements.
    pub strict: bool,
}

/// A file applied during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub id: String,
    pub file: String,
    pub statements: usize,
    /// False when another runner recorded the ID first.
    pub recorded: bool,
}

/// Outcome of [`Migrator::run`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub applied: Vec<AppliedMigration>,
    /// Files skipped because their ID was already in the ledger.
    pub skipped: Vec<String>,
}

/// Applied state of one candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    #[serde(flatten)]
    pub file: MigrationFile,
    pub applied: bool,
}

/// Runs migrations against one connection, with the dialect resolved once.
pub struct Migrator<C: Connection> {
    conn: C,
    dialect: Dialect,
    options: RunOptions,
}

impl<C: Connection> Migrator<C> {
    /// Resolve the connection's dialect. Fails with
    /// [`Error::UnsupportedDialect`] before anything touches the database.
    pub fn new(conn: C) -> Result<Self, Error> {
        let dialect = Dialect::from_driver(conn.driver_name())?;
        Ok(Self {
            conn,
            dialect,
            options: RunOptions::default(),
        })
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn ledger(&self) -> Ledger<'_, C> {
        Ledger::new(&self.conn, self.dialect)
    }

    /// Apply every unapplied migration from `source`, in migration ID order.
    ///
    /// Stops at the first failing statement. Statements of that file that
    /// already ran stay applied, but the file is not recorded, so the next
    /// run retries it from its first statement.
    pub fn run<S: MigrationSource>(&self, source: &S) -> Result<RunReport, Error> {
        let ledger = self.ledger();
        ledger.ensure_storage()?;

        let mut report = RunReport::default();
        for file in self.discover(source)? {
            if ledger.is_applied(&file.id)? {
                log::debug!("{}: already applied, skipping", file.name);
                report.skipped.push(file.id);
                continue;
            }

            let statements = self.apply(source, &file)?;
            let recorded = ledger.record_applied(&file.id)?;
            if recorded {
                log::info!("{}: migration applied", file.name);
            } else {
                log::warn!("{}: applied, but another runner recorded it first", file.name);
            }
            report.applied.push(AppliedMigration {
                id: file.id,
                file: file.name,
                statements,
                recorded,
            });
        }

        log::info!("migrations done");
        Ok(report)
    }

    /// Every candidate file with its applied state. Executes nothing beyond
    /// ensuring the ledger table exists.
    pub fn status<S: MigrationSource>(&self, source: &S) -> Result<Vec<MigrationStatus>, Error> {
        let ledger = self.ledger();
        ledger.ensure_storage()?;

        self.discover(source)?
            .into_iter()
            .map(|file| {
                let applied = ledger.is_applied(&file.id)?;
                Ok(MigrationStatus { file, applied })
            })
            .collect()
    }

    /// Recorded ledger entries.
    pub fn history(&self) -> Result<Vec<LedgerEntry>, Error> {
        let ledger = self.ledger();
        ledger.ensure_storage()?;
        ledger.entries()
    }

    /// Candidate `.sql` files sorted by migration ID, then by file name.
    fn discover<S: MigrationSource>(&self, source: &S) -> Result<Vec<MigrationFile>, Error> {
        let mut files = Vec::new();
        for name in source.list()? {
            if !is_sql_file(&name) {
                continue;
            }
            match MigrationFile::from_name(&name) {
                Some(file) => files.push(file),
                None if self.options.strict => {
                    return Err(Error::MalformedMigration {
                        file: name,
                        reason: "file name has no `<id>_` prefix".to_string(),
                    });
                }
                None => log::warn!("{name}: no migration ID before `_`, skipping"),
            }
        }

        files.sort_by(|a, b| compare_ids(&a.id, &b.id).then_with(|| a.name.cmp(&b.name)));

        let mut seen = HashSet::new();
        for file in &files {
            if !seen.insert(file.id.as_str()) {
                if self.options.strict {
                    return Err(Error::MalformedMigration {
                        file: file.name.clone(),
                        reason: format!("migration ID {} is used by another file", file.id),
                    });
                }
                log::warn!("{}: migration ID {} is used by another file", file.name, file.id);
            }
        }

        log::debug!("found {} migration files in {}", files.len(), source.location());
        Ok(files)
    }

    /// Execute one file's statements and return how many ran.
    ///
    /// In strict mode the whole file is split before anything runs, so a
    /// malformed file is rejected untouched.
    fn apply<S: MigrationSource>(&self, source: &S, file: &MigrationFile) -> Result<usize, Error> {
        let text = source.read(&file.name)?;
        let mut statements = split(&text);

        if self.options.strict {
            let collected: Vec<Statement> = statements.by_ref().collect();
            if let Some(fragment) = statements.remainder() {
                return Err(Error::MalformedMigration {
                    file: file.name.clone(),
                    reason: format!("unterminated statement at end of file: {fragment}"),
                });
            }
            for statement in &collected {
                self.execute(file, statement)?;
            }
            return Ok(collected.len());
        }

        let mut executed = 0;
        for statement in statements.by_ref() {
            self.execute(file, &statement)?;
            executed += 1;
        }
        if let Some(fragment) = statements.remainder() {
            log::warn!("{}: dropping unterminated trailing statement: {fragment}", file.name);
        }
        Ok(executed)
    }

    fn execute(&self, file: &MigrationFile, statement: &Statement) -> Result<(), Error> {
        self.conn
            .execute(statement.as_str(), &[])
            .map_err(|e| Error::StatementExecution {
                dialect: self.dialect.name(),
                file: file.name.clone(),
                line: statement.line,
                statement: statement.sql.clone(),
                source: e,
            })?;
        log::info!("{}: sql executed", file.name);
        Ok(())
    }
}
