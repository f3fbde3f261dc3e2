//! SQLite implementation of the sqlmig connection trait.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{ffi, params, params_from_iter, Batch, ErrorCode, OptionalExtension, Params, Statement};
use sqlmig_core::{Connection, DbError};

/// Driver identity reported to the migrator.
pub const DRIVER_NAME: &str = "sqlite3";

/// SQLite-backed connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open (or create) a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = rusqlite::Connection::open(path.as_ref()).map_err(|e| {
            DbError::Execution(format!("failed to open {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(db_error)?;
        Self::from_connection(conn)
    }

    /// Wrap an already-open rusqlite connection.
    pub fn from_connection(conn: rusqlite::Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db_error)?;
        Ok(Self { conn })
    }

    /// Borrow the underlying rusqlite connection.
    pub fn conn(&self) -> &rusqlite::Connection {
        &self.conn
    }

    /// True if a table with this name exists.
    pub fn table_exists(&self, name: &str) -> Result<bool, DbError> {
        let count = self.query_count(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[name],
        )?;
        Ok(count > 0)
    }
}

impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, DbError> {
        log::trace!("sqlite execute: {sql}");
        if params.is_empty() {
            // A statement line may hold several statements; run each one and
            // skip empty ones such as a stray `;`.
            let mut batch = Batch::new(&self.conn, sql);
            while let Some(mut stmt) = batch.next().map_err(db_error)? {
                drain(&mut stmt, params![])?;
            }
        } else {
            let mut stmt = self.conn.prepare(sql).map_err(db_error)?;
            drain(&mut stmt, params_from_iter(params.iter()))?;
        }
        Ok(self.conn.changes() as u64)
    }

    fn query_count(&self, sql: &str, params: &[&str]) -> Result<i64, DbError> {
        let count = self
            .conn
            .query_row(sql, params_from_iter(params.iter()), |row| row.get::<_, i64>(0))
            .optional()
            .map_err(db_error)?;
        Ok(count.unwrap_or(0))
    }

    fn query_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<Vec<String>>, DbError> {
        let mut stmt = self.conn.prepare(sql).map_err(db_error)?;
        let columns = stmt.column_count();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..columns)
                    .map(|i| row.get_ref(i).map(value_to_string))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;

        Ok(rows)
    }
}

/// Step through every row so statements like `SELECT 1;` run to completion.
fn drain<P: Params>(stmt: &mut Statement<'_>, params: P) -> Result<(), DbError> {
    let mut rows = stmt.query(params).map_err(db_error)?;
    while rows.next().map_err(db_error)?.is_some() {}
    Ok(())
}

fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

fn db_error(err: rusqlite::Error) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
        {
            DbError::UniqueViolation(err.to_string())
        }
        _ => DbError::Execution(err.to_string()),
    }
}
