//! Session management: connection and transaction scoping.
//!
//! A [`Database`] pairs a driver with a configuration source. Each logical
//! unit of work obtains its own [`Session`], which holds at most one
//! physical connection and at most one in-flight transaction. Scopes are
//! re-entrant within a session: nesting connection scopes shares the one
//! physical connection, and nested transaction scopes run on savepoints of
//! the outer transaction.
//!
//! A session is confined to one concurrent task; the connection and
//! in-flight transaction are not safe for concurrent use from multiple
//! tasks. Statements issued sequentially within one scope execute in
//! issuance order.

use std::future::Future;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ConfigSource;
use crate::driver::{Connection, Driver};
use crate::error::{DbError, DbResult};

/// How a transaction scope body finished.
///
/// `Stopped` marks deliberate early termination of a lazily-consumed result
/// stream; it commits like `Complete`. Only an `Err` from the body rolls
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The body ran to completion.
    Complete(T),
    /// The consumer stopped pulling results early, without an error.
    Stopped(T),
}

impl<T> Outcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Complete(value) | Self::Stopped(value) => value,
        }
    }
}

/// Manages access to a PostgreSQL database.
///
/// Configuration can be a static [`Config`](crate::Config) record, a
/// producer function, or an asynchronous producer (see
/// [`ConfigSource`]).
pub struct Database<D: Driver> {
    driver: D,
    config: ConfigSource,
}

impl<D: Driver> Database<D> {
    pub fn new(driver: D, config: impl Into<ConfigSource>) -> Self {
        Self {
            driver,
            config: config.into(),
        }
    }

    /// Create a session for one logical unit of work. Sessions are
    /// independent: concurrent tasks each take their own session and their
    /// own physical connection.
    pub fn session(&self) -> Session<'_, D> {
        Session {
            database: self,
            state: Mutex::new(SessionState {
                conn: None,
                conn_depth: 0,
                txn_id: None,
                txn_depth: 0,
            }),
        }
    }
}

pub(crate) struct SessionState<C> {
    pub(crate) conn: Option<C>,
    conn_depth: u32,
    pub(crate) txn_id: Option<String>,
    txn_depth: u32,
}

/// Per-logical-context state: at most one physical connection and at most
/// one active transaction identifier.
pub struct Session<'d, D: Driver> {
    database: &'d Database<D>,
    pub(crate) state: Mutex<SessionState<D::Conn>>,
}

impl<'d, D: Driver> Session<'d, D> {
    /// The active transaction identifier, for diagnostic correlation only.
    pub async fn transaction_id(&self) -> Option<String> {
        self.state.lock().await.txn_id.clone()
    }

    /// Run `body` inside a connection scope.
    ///
    /// If a connection is already open for this session the scope is
    /// re-entrant and shares it. Otherwise the configuration is resolved and
    /// validated, a connection is opened with the present fields only, and
    /// it is closed when this scope exits; a close failure is logged, never
    /// propagated.
    pub async fn connection<'a, T, F, Fut>(&'a self, body: F) -> DbResult<T>
    where
        F: FnOnce(&'a Session<'d, D>) -> Fut,
        Fut: Future<Output = DbResult<T>> + 'a,
    {
        self.enter_connection().await?;
        let result = body(self).await;
        self.exit_connection().await;
        result
    }

    /// Run `body` inside a transaction scope.
    ///
    /// Opens (or shares) the session's connection, starts a transaction at
    /// the outermost scope or a savepoint when nested, and on exit commits
    /// for `Ok(Outcome::Complete)` and `Ok(Outcome::Stopped)` or rolls back
    /// for `Err`, re-raising the original error unchanged. The transaction
    /// identifier is cleared from the session when the scope exits,
    /// whatever the outcome.
    pub async fn transaction<'a, T, F, Fut>(&'a self, body: F) -> DbResult<T>
    where
        F: FnOnce(&'a Session<'d, D>) -> Fut,
        Fut: Future<Output = DbResult<Outcome<T>>> + 'a,
    {
        self.enter_connection().await?;
        let result = self.transaction_scope(body).await;
        self.exit_connection().await;
        result
    }

    async fn enter_connection(&self) -> DbResult<()> {
        let mut state = self.state.lock().await;
        if state.conn.is_some() {
            // connection already established
            state.conn_depth += 1;
            return Ok(());
        }
        let config = self.database.config.resolve().await?;
        let params = config.connect_params();
        debug!(options = params.len(), "open connection");
        let conn = self.database.driver.connect(&params).await?;
        state.conn = Some(conn);
        state.conn_depth = 1;
        Ok(())
    }

    /// The connection closes when the outermost scope exits.
    async fn exit_connection(&self) {
        let conn = {
            let mut state = self.state.lock().await;
            state.conn_depth = state.conn_depth.saturating_sub(1);
            if state.conn_depth == 0 {
                state.conn.take()
            } else {
                None
            }
        };
        if let Some(conn) = conn {
            debug!("close connection");
            if let Err(e) = conn.close().await {
                error!(error = %e, "failed to close connection");
            }
        }
    }

    async fn transaction_scope<'a, T, F, Fut>(&'a self, body: F) -> DbResult<T>
    where
        F: FnOnce(&'a Session<'d, D>) -> Fut,
        Fut: Future<Output = DbResult<Outcome<T>>> + 'a,
    {
        let txid = new_transaction_id();
        let (depth, prev) = {
            let mut state = self.state.lock().await;
            state.txn_depth += 1;
            let prev = state.txn_id.replace(txid.clone());
            (state.txn_depth, prev)
        };
        let mut guard = TxnGuard {
            state: &self.state,
            prev,
            completed: false,
        };

        let begun = if depth == 1 {
            info!(transaction_id = %txid, "transaction begin");
            self.begin_conn().await
        } else {
            debug!(transaction_id = %txid, depth = depth, "savepoint begin");
            self.raw_execute(&savepoint_sql("SAVEPOINT", depth)).await
        };
        if let Err(e) = begun {
            guard.completed = true;
            return Err(e);
        }

        match body(self).await {
            Ok(outcome) => {
                let value = outcome.into_inner();
                let committed = if depth == 1 {
                    info!(transaction_id = %txid, "transaction commit");
                    self.commit_conn().await
                } else {
                    debug!(transaction_id = %txid, depth = depth, "savepoint release");
                    self.raw_execute(&savepoint_sql("RELEASE SAVEPOINT", depth))
                        .await
                };
                guard.completed = true;
                committed.map(|_| value)
            }
            Err(err) => {
                // best-effort rollback; the original failure is re-raised
                let rolled_back = if depth == 1 {
                    info!(transaction_id = %txid, "transaction rollback");
                    self.rollback_conn().await
                } else {
                    debug!(transaction_id = %txid, depth = depth, "savepoint rollback");
                    self.raw_execute(&savepoint_sql("ROLLBACK TO SAVEPOINT", depth))
                        .await
                };
                if let Err(e) = rolled_back {
                    error!(transaction_id = %txid, error = %e, "rollback failed");
                }
                guard.completed = true;
                Err(err)
            }
        }
    }

    async fn begin_conn(&self) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let conn = state.conn.as_mut().ok_or_else(no_connection)?;
        conn.begin().await
    }

    async fn commit_conn(&self) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let conn = state.conn.as_mut().ok_or_else(no_connection)?;
        conn.commit().await
    }

    async fn rollback_conn(&self) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let conn = state.conn.as_mut().ok_or_else(no_connection)?;
        conn.rollback().await
    }

    async fn raw_execute(&self, sql: &str) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let conn = state.conn.as_mut().ok_or_else(no_connection)?;
        conn.execute(sql, &[]).await.map(|_| ())
    }
}

/// Restores transaction bookkeeping when a scope exits, including when the
/// scope future is dropped by task cancellation. The physical rollback
/// cannot run here; a connection dropped mid-transaction must be discarded.
struct TxnGuard<'s, C> {
    state: &'s Mutex<SessionState<C>>,
    prev: Option<String>,
    completed: bool,
}

impl<C> Drop for TxnGuard<'_, C> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock() {
            state.txn_depth = state.txn_depth.saturating_sub(1);
            state.txn_id = self.prev.take();
            if !self.completed {
                warn!("transaction scope dropped before commit or rollback");
            }
        }
    }
}

fn no_connection() -> DbError {
    DbError::usage("connection context required")
}

fn savepoint_sql(verb: &str, depth: u32) -> String {
    format!("{verb} sp_{depth}")
}

/// Generate a unique transaction ID.
fn new_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}
