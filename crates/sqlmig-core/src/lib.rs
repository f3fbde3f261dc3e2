//! sqlmig core library - dialect table, statement splitter, ledger and runner.
//!
//! This crate opens no database connection and touches no filesystem. Callers
//! hand it a [`Connection`] and a [`MigrationSource`].

mod db;
mod dialect;
mod error;
mod ledger;
mod migration;
mod runner;
mod splitter;

#[cfg(test)]
mod fake;

pub use db::{Connection, DbError};
pub use dialect::{Dialect, Placeholder};
pub use error::{Error, LedgerOp};
pub use ledger::{Ledger, LedgerEntry, LEDGER_TABLE};
pub use migration::{compare_ids, parse_migration_id, MemorySource, MigrationFile, MigrationSource};
pub use runner::{AppliedMigration, MigrationStatus, Migrator, RunOptions, RunReport};
pub use splitter::{split, Statement, StatementKind, Statements};
