//! Driver adapters.
//!
//! A [`Driver`] owns one native connection and knows how to run a statement
//! with positional [`Value`] parameters. Everything above this layer
//! ([`Database`](crate::Database), the query builder) is dialect-agnostic.

use crate::config::{ConnectionConfig, DialectKind};
use crate::dialect::SqlDialect;
use crate::error::DbResult;
use crate::row::Row;
use crate::value::Value;
use std::future::Future;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Outcome of a non-SELECT statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows affected.
    pub rows_affected: u64,
    /// Generated id reported by the driver, if any.
    pub last_insert_id: Option<i64>,
}

/// A single native database connection.
///
/// Implementations must map every native error into
/// [`DbError`](crate::DbError); the caller attaches SQL and parameters.
pub trait Driver: Send {
    /// Which configuration rules apply.
    const KIND: DialectKind;

    /// SQL rendering rules for this driver.
    fn dialect() -> &'static dyn SqlDialect;

    /// Open a connection from a configuration (with environment fallback).
    fn connect(config: &ConnectionConfig) -> impl Future<Output = DbResult<Self>> + Send
    where
        Self: Sized;

    /// Run a statement and return all rows.
    fn fetch_all(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// Run a statement and return the affected row count.
    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<ExecOutcome>> + Send;

    /// Open a transaction.
    fn begin(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Commit the open transaction.
    fn commit(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> impl Future<Output = DbResult<()>> + Send;
}

/// Bind a slice of [`Value`]s onto a `sqlx::query(..)`.
///
/// JSON is bound as text; both MySQL and SQLite accept JSON documents in
/// string form.
#[cfg(any(feature = "mysql", feature = "sqlite"))]
macro_rules! bind_values {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for value in $params {
            query = match value {
                $crate::Value::Null => query.bind(None::<i64>),
                $crate::Value::Bool(b) => query.bind(*b),
                $crate::Value::Int(i) => query.bind(*i),
                $crate::Value::Float(f) => query.bind(*f),
                $crate::Value::Text(s) => query.bind(s.as_str()),
                $crate::Value::Bytes(b) => query.bind(b.as_slice()),
                $crate::Value::Json(j) => query.bind(j.to_string()),
            };
        }
        query
    }};
}

#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub(crate) use bind_values;

/// Map a sqlx error raised while opening a connection.
#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub(crate) fn sqlx_connect_error(kind: &str, err: sqlx::Error) -> crate::DbError {
    crate::DbError::connection(format!("Unable to connect to {kind}")).with_debug(err.to_string())
}

/// Map a sqlx error raised by transaction control.
#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub(crate) fn sqlx_tx_error(step: &str, err: sqlx::Error) -> crate::DbError {
    crate::DbError::transaction(format!("Failed to {step} transaction")).with_debug(err.to_string())
}
