use std::fmt;
use std::io;

use thiserror::Error;

use crate::db::DbError;

/// Ledger operation that failed, carried in [`Error::Ledger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    EnsureStorage,
    IsApplied,
    RecordApplied,
    ListEntries,
}

impl fmt::Display for LedgerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerOp::EnsureStorage => "create ledger table",
            LedgerOp::IsApplied => "query applied status",
            LedgerOp::RecordApplied => "record applied migration",
            LedgerOp::ListEntries => "list ledger entries",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported dialect: driver {0:?} is not one of mysql, postgres, pgx, sqlite3")]
    UnsupportedDialect(String),

    #[error("failed to read migrations directory {path}: {source}")]
    DirectoryRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read migration file {file}: {source}")]
    FileRead {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("{dialect}: {file}:{line}: statement failed: {statement}")]
    StatementExecution {
        dialect: &'static str,
        file: String,
        line: usize,
        statement: String,
        #[source]
        source: DbError,
    },

    #[error(
        "{dialect}: failed to {op}{}",
        .migration_id.as_deref().map(|id| format!(" for migration {id}")).unwrap_or_default()
    )]
    Ledger {
        dialect: &'static str,
        op: LedgerOp,
        migration_id: Option<String>,
        #[source]
        source: DbError,
    },

    #[error("malformed migration {file}: {reason}")]
    MalformedMigration { file: String, reason: String },
}
