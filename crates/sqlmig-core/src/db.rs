use thiserror::Error;

/// Failure reported by a [`Connection`] implementation.
#[derive(Error, Debug)]
pub enum DbError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("{0}")]
    Execution(String),
}

/// An open database handle the migrator runs against.
///
/// Every call blocks until the database answers. Parameters are positional
/// and bound as text; their placeholder syntax comes from the
/// [`Dialect`](crate::Dialect) matching [`driver_name`](Connection::driver_name).
pub trait Connection {
    /// Driver identity, e.g. `"sqlite3"`, `"postgres"`, `"pgx"`, `"mysql"`.
    fn driver_name(&self) -> &str;

    /// Execute one statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, DbError>;

    /// Run a scalar count query. An empty result must be reported as `0`.
    fn query_count(&self, sql: &str, params: &[&str]) -> Result<i64, DbError>;

    /// Run a query returning rows of text columns.
    fn query_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<Vec<String>>, DbError>;
}

impl<C: Connection + ?Sized> Connection for &C {
    fn driver_name(&self) -> &str {
        (**self).driver_name()
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, DbError> {
        (**self).execute(sql, params)
    }

    fn query_count(&self, sql: &str, params: &[&str]) -> Result<i64, DbError> {
        (**self).query_count(sql, params)
    }

    fn query_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<Vec<String>>, DbError> {
        (**self).query_rows(sql, params)
    }
}
