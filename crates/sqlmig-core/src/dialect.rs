//! Closed table of supported database dialects.

use crate::error::Error;

/// Parameter placeholder syntax of a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?` for every position.
    Question,
    /// `$1`, `$2`, ...
    Dollar,
}

impl Placeholder {
    /// Token for the 1-based parameter `position`.
    pub fn token(self, position: usize) -> String {
        match self {
            Placeholder::Question => "?".to_string(),
            Placeholder::Dollar => format!("${position}"),
        }
    }
}

/// A supported database kind, resolved once from the connection's driver name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Resolve a driver identity. Anything outside the closed set is
    /// [`Error::UnsupportedDialect`].
    pub fn from_driver(driver: &str) -> Result<Self, Error> {
        match driver {
            "mysql" => Ok(Dialect::MySql),
            "postgres" | "pgx" => Ok(Dialect::Postgres),
            "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(Error::UnsupportedDialect(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite3",
        }
    }

    pub fn placeholder_style(self) -> Placeholder {
        match self {
            Dialect::MySql | Dialect::Sqlite => Placeholder::Question,
            Dialect::Postgres => Placeholder::Dollar,
        }
    }

    /// Placeholder token for the 1-based parameter `position`.
    pub fn placeholder(self, position: usize) -> String {
        self.placeholder_style().token(position)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the ledger table.
    pub fn ledger_ddl(self) -> &'static str {
        match self {
            Dialect::MySql => {
                "CREATE TABLE IF NOT EXISTS migrations (
    id INT AUTO_INCREMENT PRIMARY KEY,
    id_migration VARCHAR(255) NOT NULL UNIQUE,
    executed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)"
            }
            Dialect::Postgres => {
                "CREATE TABLE IF NOT EXISTS migrations (
    id SERIAL PRIMARY KEY,
    id_migration VARCHAR(255) NOT NULL UNIQUE,
    executed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)"
            }
            Dialect::Sqlite => {
                "CREATE TABLE IF NOT EXISTS migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    id_migration TEXT NOT NULL UNIQUE,
    executed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)"
            }
        }
    }
}
