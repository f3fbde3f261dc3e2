//! End-to-end runs against a real SQLite database and migration directory.

use std::fs;

use sqlmig_core::{Connection, DbError, Error, Migrator, RunOptions};
use sqlmig_files::DirectorySource;
use sqlmig_sqlite::SqliteConnection;
use tempfile::TempDir;

fn setup(files: &[(&str, &str)]) -> (TempDir, DirectorySource, SqliteConnection) {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("migrations");
    fs::create_dir(&dir).unwrap();
    for (name, text) in files {
        fs::write(dir.join(name), text).unwrap();
    }
    let conn = SqliteConnection::open(temp_dir.path().join("app.db")).unwrap();
    (temp_dir, DirectorySource::new(dir), conn)
}

fn ledger_ids(conn: &SqliteConnection) -> Vec<String> {
    conn.query_rows("SELECT id_migration FROM migrations ORDER BY id", &[])
        .unwrap()
        .into_iter()
        .map(|row| row[0].clone())
        .collect()
}

#[test]
fn test_first_run_applies_and_records() {
    let (_temp, source, conn) = setup(&[("001_init.sql", "CREATE TABLE t (x INT);\n")]);

    let report = Migrator::new(&conn).unwrap().run(&source).unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(ledger_ids(&conn), vec!["001"]);
    assert!(conn.table_exists("t").unwrap());
}

#[test]
fn test_second_run_executes_nothing() {
    let (_temp, source, conn) = setup(&[(
        "001_init.sql",
        "CREATE TABLE t (x INT);\nINSERT INTO t (x) VALUES (1);\n",
    )]);
    let migrator = Migrator::new(&conn).unwrap();

    migrator.run(&source).unwrap();
    let report = migrator.run(&source).unwrap();

    assert!(report.applied.is_empty());
    assert_eq!(report.skipped, vec!["001"]);
    assert_eq!(ledger_ids(&conn), vec!["001"]);
    assert_eq!(conn.query_count("SELECT COUNT(*) FROM t", &[]).unwrap(), 1);
}

#[test]
fn test_persists_across_connections() {
    let (temp, source, conn) = setup(&[("001_init.sql", "CREATE TABLE t (x INT);\n")]);
    Migrator::new(&conn).unwrap().run(&source).unwrap();
    drop(conn);

    let reopened = SqliteConnection::open(temp.path().join("app.db")).unwrap();
    let report = Migrator::new(&reopened).unwrap().run(&source).unwrap();
    assert!(report.applied.is_empty());
}

#[test]
fn test_comments_and_multiline_statements() {
    let (_temp, source, conn) = setup(&[(
        "001_users.sql",
        "-- users table\n\
         CREATE TABLE users (\n\
         \x20   id INTEGER PRIMARY KEY,\n\
         \x20   -- login name\n\
         \x20   name TEXT NOT NULL\n\
         );\n\
         \n\
         CREATE INDEX idx_users_name ON users(name);\n",
    )]);

    let report = Migrator::new(&conn).unwrap().run(&source).unwrap();

    assert_eq!(report.applied[0].statements, 2);
    assert!(conn.table_exists("users").unwrap());
    assert_eq!(
        conn.query_count(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
            &["idx_users_name"],
        )
        .unwrap(),
        1
    );
}

#[test]
fn test_later_migration_picked_up() {
    let (temp, source, conn) = setup(&[("001_init.sql", "CREATE TABLE t (x INT);\n")]);
    let migrator = Migrator::new(&conn).unwrap();
    migrator.run(&source).unwrap();

    fs::write(
        temp.path().join("migrations").join("002_add_y.sql"),
        "ALTER TABLE t ADD COLUMN y TEXT;\n",
    )
    .unwrap();
    let report = migrator.run(&source).unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].id, "002");
    assert_eq!(ledger_ids(&conn), vec!["001", "002"]);
}

#[test]
fn test_failing_statement_leaves_file_unrecorded() {
    let (_temp, source, conn) = setup(&[
        ("001_init.sql", "CREATE TABLE t (x INT);\n"),
        (
            "002_bad.sql",
            "CREATE TABLE IF NOT EXISTS u (y INT);\nINSERT INTO missing VALUES (1);\n",
        ),
    ]);

    match Migrator::new(&conn).unwrap().run(&source) {
        Err(Error::StatementExecution {
            dialect,
            file,
            line,
            ..
        }) => {
            assert_eq!(dialect, "sqlite3");
            assert_eq!(file, "002_bad.sql");
            assert_eq!(line, 2);
        }
        other => panic!("expected statement error, got {:?}", other),
    }

    assert_eq!(ledger_ids(&conn), vec!["001"]);
    // Partial application is kept.
    assert!(conn.table_exists("u").unwrap());
}

#[test]
fn test_several_statements_on_one_line() {
    let (_temp, source, conn) = setup(&[(
        "001_init.sql",
        "CREATE TABLE a (x INT); CREATE TABLE b (y INT);\n",
    )]);

    Migrator::new(&conn).unwrap().run(&source).unwrap();

    assert!(conn.table_exists("a").unwrap());
    assert!(conn.table_exists("b").unwrap());
    assert_eq!(ledger_ids(&conn), vec!["001"]);
}

#[test]
fn test_stray_terminator_line() {
    let (_temp, source, conn) = setup(&[("001_init.sql", "CREATE TABLE a (x INT);\n;\n")]);

    let report = Migrator::new(&conn).unwrap().run(&source).unwrap();

    assert_eq!(report.applied[0].statements, 1);
    assert!(conn.table_exists("a").unwrap());
    assert_eq!(ledger_ids(&conn), vec!["001"]);
}

#[test]
fn test_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let conn = SqliteConnection::open_in_memory().unwrap();
    let source = DirectorySource::new(temp_dir.path().join("nope"));

    assert!(matches!(
        Migrator::new(&conn).unwrap().run(&source),
        Err(Error::DirectoryRead { .. })
    ));
}

#[test]
fn test_strict_mode_rejects_unterminated_statement() {
    let (_temp, source, conn) = setup(&[(
        "001_init.sql",
        "CREATE TABLE a (x INT);\nCREATE TABLE b (y INT)\n",
    )]);
    let migrator = Migrator::new(&conn)
        .unwrap()
        .with_options(RunOptions { strict: true });

    assert!(matches!(
        migrator.run(&source),
        Err(Error::MalformedMigration { .. })
    ));
    assert!(!conn.table_exists("a").unwrap());
    assert!(ledger_ids(&conn).is_empty());
}

#[test]
fn test_history_lists_entries() {
    let (_temp, source, conn) = setup(&[
        ("001_init.sql", "CREATE TABLE t (x INT);\n"),
        ("002_more.sql", "CREATE TABLE u (y INT);\n"),
    ]);
    let migrator = Migrator::new(&conn).unwrap();
    migrator.run(&source).unwrap();

    let history = migrator.history().unwrap();
    let ids: Vec<&str> = history.iter().map(|e| e.migration_id.as_str()).collect();
    assert_eq!(ids, vec!["001", "002"]);
    assert!(history.iter().all(|e| !e.executed_at.is_empty()));
}

/// Connection reporting a driver outside the supported set.
struct OracleConnection<'a>(&'a SqliteConnection);

impl Connection for OracleConnection<'_> {
    fn driver_name(&self) -> &str {
        "oracle"
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, DbError> {
        self.0.execute(sql, params)
    }

    fn query_count(&self, sql: &str, params: &[&str]) -> Result<i64, DbError> {
        self.0.query_count(sql, params)
    }

    fn query_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<Vec<String>>, DbError> {
        self.0.query_rows(sql, params)
    }
}

#[test]
fn test_unsupported_dialect_creates_nothing() {
    let conn = SqliteConnection::open_in_memory().unwrap();

    match Migrator::new(OracleConnection(&conn)) {
        Err(Error::UnsupportedDialect(name)) => assert_eq!(name, "oracle"),
        Err(other) => panic!("expected UnsupportedDialect, got {:?}", other),
        Ok(_) => panic!("oracle must not be accepted"),
    }
    assert!(!conn.table_exists("migrations").unwrap());
}
