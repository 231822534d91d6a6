//! In-memory mock driver for session and executor tests.
//!
//! The mock records every connect, close, and statement, and models
//! transaction boundaries well enough to observe commit/rollback and
//! savepoint behavior: `begin` opens an empty pending set, `commit` moves
//! pending statements to the committed log, `rollback` discards them, and
//! savepoint commands truncate the pending set back to their mark.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pglink::driver::{Connection, Driver, Row, RowSource};
use pglink::{DbError, DbResult, Value};

#[derive(Default)]
pub struct Shared {
    pub connects: usize,
    pub closed: usize,
    /// Every SQL string the connection saw, in order.
    pub log: Vec<String>,
    /// Statements executed inside the open transaction.
    pub pending: Vec<String>,
    /// Statements surviving a commit.
    pub committed: Vec<String>,
    /// Pending-set marks for open savepoints.
    pub savepoints: Vec<usize>,
    /// Fail any statement containing this substring.
    pub fail_on: Option<String>,
    /// Fail the next rollback.
    pub fail_on_rollback: bool,
    /// Fail the next close.
    pub fail_on_close: bool,
    /// Scripted result sets, popped per cursor open.
    pub results: VecDeque<Vec<Row>>,
}

#[derive(Clone, Default)]
pub struct MockDriver {
    pub shared: Arc<Mutex<Shared>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, rows: Vec<Row>) {
        self.shared.lock().unwrap().results.push_back(rows);
    }

    pub fn fail_on(&self, fragment: &str) {
        self.shared.lock().unwrap().fail_on = Some(fragment.to_string());
    }

    pub fn fail_on_rollback(&self) {
        self.shared.lock().unwrap().fail_on_rollback = true;
    }

    pub fn fail_on_close(&self) {
        self.shared.lock().unwrap().fail_on_close = true;
    }
}

pub struct MockConnection {
    shared: Arc<Mutex<Shared>>,
}

pub struct MockRows {
    rows: VecDeque<Row>,
}

impl RowSource for MockRows {
    async fn next_row(&mut self) -> DbResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}

impl Connection for MockConnection {
    type Rows = MockRows;

    async fn begin(&mut self) -> DbResult<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.log.push("BEGIN".to_string());
        shared.pending.clear();
        shared.savepoints.clear();
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.log.push("COMMIT".to_string());
        let pending = std::mem::take(&mut shared.pending);
        shared.committed.extend(pending);
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.log.push("ROLLBACK".to_string());
        if shared.fail_on_rollback {
            return Err(DbError::driver(
                "rollback failed: connection lost",
                Some("08006".to_string()),
            ));
        }
        shared.pending.clear();
        Ok(())
    }

    async fn execute(&mut self, sql: &str, _params: &[Value]) -> DbResult<u64> {
        let mut shared = self.shared.lock().unwrap();
        shared.log.push(sql.to_string());
        if let Some(fragment) = &shared.fail_on {
            if sql.contains(fragment.as_str()) {
                return Err(DbError::driver(
                    format!("statement failed: {sql}"),
                    Some("XX000".to_string()),
                ));
            }
        }
        if sql.starts_with("ROLLBACK TO SAVEPOINT") {
            if let Some(mark) = shared.savepoints.last().copied() {
                shared.pending.truncate(mark);
            }
        } else if sql.starts_with("RELEASE SAVEPOINT") {
            shared.savepoints.pop();
        } else if sql.starts_with("SAVEPOINT") {
            let mark = shared.pending.len();
            shared.savepoints.push(mark);
        } else {
            shared.pending.push(sql.to_string());
        }
        Ok(0)
    }

    async fn cursor(&mut self, sql: &str, _params: &[Value]) -> DbResult<Self::Rows> {
        let mut shared = self.shared.lock().unwrap();
        shared.log.push(sql.to_string());
        let rows = shared.results.pop_front().unwrap_or_default();
        Ok(MockRows { rows: rows.into() })
    }

    async fn close(self) -> DbResult<()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail_on_close {
            return Err(DbError::driver(
                "close failed: connection lost",
                Some("08006".to_string()),
            ));
        }
        shared.closed += 1;
        Ok(())
    }
}

impl Driver for MockDriver {
    type Conn = MockConnection;

    async fn connect(&self, _params: &pglink::ConnectParams) -> DbResult<Self::Conn> {
        self.shared.lock().unwrap().connects += 1;
        Ok(MockConnection {
            shared: Arc::clone(&self.shared),
        })
    }
}

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
