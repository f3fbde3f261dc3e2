//! Recording in-memory connection used by the unit tests.

use std::cell::{Cell, RefCell};

use crate::db::{Connection, DbError};
use crate::ledger::LEDGER_TABLE;

pub(crate) struct FakeConnection {
    driver: String,
    ledger_created: Cell<bool>,
    ledger: RefCell<Vec<(String, String)>>,
    statements: RefCell<Vec<String>>,
    fail_on: RefCell<Option<String>>,
    recorded_elsewhere: RefCell<Vec<String>>,
}

impl FakeConnection {
    pub(crate) fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            ledger_created: Cell::new(false),
            ledger: RefCell::new(Vec::new()),
            statements: RefCell::new(Vec::new()),
            fail_on: RefCell::new(None),
            recorded_elsewhere: RefCell::new(Vec::new()),
        }
    }

    /// Reject any migration statement containing `needle`.
    pub(crate) fn fail_on(&self, needle: &str) {
        *self.fail_on.borrow_mut() = Some(needle.to_string());
    }

    /// Make the ledger insert for `id` lose to another runner that records
    /// it at the same moment.
    pub(crate) fn record_elsewhere_on_insert(&self, id: &str) {
        self.recorded_elsewhere.borrow_mut().push(id.to_string());
    }

    pub(crate) fn clear_failure(&self) {
        *self.fail_on.borrow_mut() = None;
    }

    /// Migration statements executed so far (ledger queries excluded).
    pub(crate) fn statements(&self) -> Vec<String> {
        self.statements.borrow().clone()
    }

    pub(crate) fn ledger_created(&self) -> bool {
        self.ledger_created.get()
    }

    pub(crate) fn ledger_ids(&self) -> Vec<String> {
        self.ledger.borrow().iter().map(|(id, _)| id.clone()).collect()
    }

    fn is_ledger_sql(sql: &str) -> bool {
        sql.contains(&format!(" {LEDGER_TABLE}"))
    }

    fn require_ledger(&self) -> Result<(), DbError> {
        if self.ledger_created.get() {
            Ok(())
        } else {
            Err(DbError::Execution(format!("no such table: {LEDGER_TABLE}")))
        }
    }
}

impl Connection for FakeConnection {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, DbError> {
        if Self::is_ledger_sql(sql) {
            if sql.starts_with("CREATE TABLE IF NOT EXISTS") {
                self.ledger_created.set(true);
                return Ok(0);
            }
            self.require_ledger()?;
            let id = params.first().copied().unwrap_or_default().to_string();
            let at = params.get(1).copied().unwrap_or_default().to_string();
            let mut ledger = self.ledger.borrow_mut();
            if self.recorded_elsewhere.borrow().contains(&id) {
                ledger.push((id.clone(), at.clone()));
            }
            if ledger.iter().any(|(existing, _)| *existing == id) {
                return Err(DbError::UniqueViolation(format!("{LEDGER_TABLE}.id_migration")));
            }
            ledger.push((id, at));
            return Ok(1);
        }

        if let Some(needle) = self.fail_on.borrow().as_deref() {
            if sql.contains(needle) {
                return Err(DbError::Execution(format!("syntax error near {needle:?}")));
            }
        }
        self.statements.borrow_mut().push(sql.to_string());
        Ok(0)
    }

    fn query_count(&self, _sql: &str, params: &[&str]) -> Result<i64, DbError> {
        self.require_ledger()?;
        let id = params.first().copied().unwrap_or_default();
        let count = self.ledger.borrow().iter().filter(|(e, _)| e == id).count();
        Ok(count as i64)
    }

    fn query_rows(&self, _sql: &str, _params: &[&str]) -> Result<Vec<Vec<String>>, DbError> {
        self.require_ledger()?;
        Ok(self
            .ledger
            .borrow()
            .iter()
            .map(|(id, at)| vec![id.clone(), at.clone()])
            .collect())
    }
}
