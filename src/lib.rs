//! Typed PostgreSQL access layer.
//!
//! This crate maps an application-level type system onto PostgreSQL values
//! through a fixed chain of codec providers, and scopes database work with
//! explicit, re-entrant connection and transaction contexts.
//!
//! - [`codec::resolve`] turns a [`TypeDescriptor`] into a cached
//!   [`codec::Codec`] pairing an encoder, a decoder, and a SQL type name.
//! - [`Database::session`] creates a per-task [`Session`]; its
//!   [`connection`](Session::connection) and
//!   [`transaction`](Session::transaction) scopes manage the physical
//!   connection and commit/rollback boundaries.
//! - [`Statement`] interleaves SQL text with typed parameters, serialized
//!   to 1-based positional markers at execution time.
//! - Query results arrive as a pull-based [`RowStream`] of decoded
//!   [`Record`]s.
//!
//! Actual wire I/O is behind the [`driver`] traits; any PostgreSQL client
//! that can implement [`driver::Driver`] plugs in underneath.

pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
mod executor;
pub mod session;
pub mod statement;
pub mod stream;
pub mod types;

pub use codec::{Codec, resolve};
pub use config::{Config, ConfigSource, ConnectParams, SslMode};
pub use driver::{Connection, Driver, Row, RowSource};
pub use error::{DbError, DbResult};
pub use session::{Database, Outcome, Session};
pub use statement::{Fragment, Statement, TypedValue};
pub use stream::RowStream;
pub use types::{
    ContainerKind, Field, LiteralValue, Record, RecordType, ScalarKind, TypeDescriptor, Value,
};
