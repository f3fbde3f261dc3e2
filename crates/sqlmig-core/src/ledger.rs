//! The `migrations` table recording which migration IDs have been applied.

use chrono::Utc;
use serde::Serialize;

use crate::db::{Connection, DbError};
use crate::dialect::Dialect;
use crate::error::{Error, LedgerOp};

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "migrations";

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub migration_id: String,
    pub executed_at: String,
}

/// Ledger access over a borrowed connection, with queries prepared for one
/// dialect.
pub struct Ledger<'c, C: Connection> {
    conn: &'c C,
    dialect: Dialect,
    count_sql: String,
    insert_sql: String,
}

impl<'c, C: Connection> Ledger<'c, C> {
    pub fn new(conn: &'c C, dialect: Dialect) -> Self {
        let count_sql = format!(
            "SELECT COUNT(*) FROM {LEDGER_TABLE} WHERE id_migration = {}",
            dialect.placeholder(1)
        );
        let insert_sql = format!(
            "INSERT INTO {LEDGER_TABLE} (id_migration, executed_at) VALUES ({}, {})",
            dialect.placeholder(1),
            dialect.placeholder(2)
        );
        Self {
            conn,
            dialect,
            count_sql,
            insert_sql,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Create the ledger table if it does not exist yet.
    pub fn ensure_storage(&self) -> Result<(), Error> {
        self.conn
            .execute(self.dialect.ledger_ddl(), &[])
            .map_err(|e| self.error(LedgerOp::EnsureStorage, None, e))?;
        log::info!("table `{LEDGER_TABLE}` initialized");
        Ok(())
    }

    /// True iff an entry for `migration_id` exists.
    pub fn is_applied(&self, migration_id: &str) -> Result<bool, Error> {
        let count = self
            .conn
            .query_count(&self.count_sql, &[migration_id])
            .map_err(|e| self.error(LedgerOp::IsApplied, Some(migration_id), e))?;
        Ok(count > 0)
    }

    /// Record `migration_id` as applied now.
    ///
    /// Returns `false` when the unique constraint shows another runner
    /// already recorded it; that is not an error.
    pub fn record_applied(&self, migration_id: &str) -> Result<bool, Error> {
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        match self.conn.execute(&self.insert_sql, &[migration_id, now.as_str()]) {
            Ok(_) => Ok(true),
            Err(DbError::UniqueViolation(msg)) => {
                log::warn!("migration {migration_id} was already recorded: {msg}");
                Ok(false)
            }
            Err(e) => Err(self.error(LedgerOp::RecordApplied, Some(migration_id), e)),
        }
    }

    /// All entries in the order they were recorded.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, Error> {
        let rows = self
            .conn
            .query_rows(
                &format!("SELECT id_migration, executed_at FROM {LEDGER_TABLE} ORDER BY id"),
                &[],
            )
            .map_err(|e| self.error(LedgerOp::ListEntries, None, e))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut cols = row.into_iter();
                LedgerEntry {
                    migration_id: cols.next().unwrap_or_default(),
                    executed_at: cols.next().unwrap_or_default(),
                }
            })
            .collect())
    }

    fn error(&self, op: LedgerOp, migration_id: Option<&str>, source: DbError) -> Error {
        Error::Ledger {
            dialect: self.dialect.name(),
            op,
            migration_id: migration_id.map(String::from),
            source,
        }
    }
}
