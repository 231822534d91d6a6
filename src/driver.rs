//! Wire-driver boundary.
//!
//! The physical driver is an external collaborator; this layer only depends
//! on the operations below. A [`Driver`] opens connections from the present
//! configuration fields; a [`Connection`] starts/commits/rolls back
//! transactions, executes statements, and opens cursors; a [`RowSource`] is
//! an asynchronous, forward-only sequence of raw rows indexable by field
//! name.

use crate::config::ConnectParams;
use crate::error::DbResult;
use crate::types::Value;

/// One raw row as produced by the driver, fields in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }
}

/// An asynchronous source of raw rows. Forward-only, non-restartable.
#[allow(async_fn_in_trait)]
pub trait RowSource {
    /// Produce the next row, or `None` once the source is exhausted.
    async fn next_row(&mut self) -> DbResult<Option<Row>>;
}

/// A physical database connection. Not safe for concurrent use from
/// multiple tasks; a connection belongs to exactly one logical context.
#[allow(async_fn_in_trait)]
pub trait Connection {
    type Rows: RowSource;

    /// Start a transaction on this connection.
    async fn begin(&mut self) -> DbResult<()>;

    /// Commit the in-flight transaction.
    async fn commit(&mut self) -> DbResult<()>;

    /// Roll back the in-flight transaction.
    async fn rollback(&mut self) -> DbResult<()>;

    /// Execute a statement for effect, returning the affected row count.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64>;

    /// Open a cursor over a statement's results.
    async fn cursor(&mut self, sql: &str, params: &[Value]) -> DbResult<Self::Rows>;

    /// Close the connection. Best-effort terminal step.
    async fn close(self) -> DbResult<()>;
}

/// Opens physical connections.
#[allow(async_fn_in_trait)]
pub trait Driver {
    type Conn: Connection;

    /// Open a connection using only the configuration fields that are
    /// present in `params`.
    async fn connect(&self, params: &ConnectParams) -> DbResult<Self::Conn>;
}
