//! Error types for dbkit

use crate::value::Value;
use thiserror::Error;

/// Result type alias for dbkit operations
pub type DbResult<T> = Result<T, DbError>;

/// Error taxonomy for database operations.
///
/// Every variant carries a short user-facing `message` and a verbose `debug`
/// string (driver error text, offending SQL, parameter snapshot). Log the
/// debug string; never show it to end users.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Bad or missing configuration, network or authentication failure
    #[error("Connection error: {message}")]
    Connection { message: String, debug: String },

    /// Malformed SQL, constraint violation, safety gate violation, invalid
    /// operator or invalid builder arguments
    #[error("Query error: {message}")]
    Query { message: String, debug: String },

    /// Begin/commit/rollback failure
    #[error("Transaction error: {message}")]
    Transaction { message: String, debug: String },
}

impl DbError {
    /// Create a connection error with no debug detail.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            debug: String::new(),
        }
    }

    /// Create a query error with no debug detail.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            debug: String::new(),
        }
    }

    /// Create a transaction error with no debug detail.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            debug: String::new(),
        }
    }

    /// Replace the debug detail.
    pub fn with_debug(mut self, detail: impl Into<String>) -> Self {
        *self.debug_mut() = detail.into();
        self
    }

    /// Append the statement and a parameter snapshot to the debug detail.
    pub fn with_statement(mut self, sql: &str, params: &[Value]) -> Self {
        let debug = self.debug_mut();
        if !debug.is_empty() {
            debug.push_str("; ");
        }
        debug.push_str(&format!("sql: {sql}; params: {params:?}"));
        self
    }

    /// The short, user-facing message.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message, .. }
            | Self::Query { message, .. }
            | Self::Transaction { message, .. } => message,
        }
    }

    /// The verbose debug detail (driver error text, SQL, parameters).
    pub fn debug_info(&self) -> &str {
        match self {
            Self::Connection { debug, .. }
            | Self::Query { debug, .. }
            | Self::Transaction { debug, .. } => debug,
        }
    }

    fn debug_mut(&mut self) -> &mut String {
        match self {
            Self::Connection { debug, .. }
            | Self::Query { debug, .. }
            | Self::Transaction { debug, .. } => debug,
        }
    }

    /// Check if this is a connection error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if this is a query error
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    /// Check if this is a transaction error
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }

    /// Wrap a tokio-postgres error raised while running a statement.
    #[cfg(feature = "postgres")]
    pub fn from_postgres(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::connection("Connection closed").with_debug(err.to_string());
        }
        let message = match err.as_db_error().map(|db_err| db_err.code().code()) {
            Some("23505") => "Unique constraint violation",
            Some("23503") => "Foreign key violation",
            Some("23514") => "Check constraint violation",
            _ => "Query failed",
        };
        Self::query(message).with_debug(err.to_string())
    }

    /// Wrap a sqlx error raised while running a statement.
    #[cfg(any(feature = "mysql", feature = "sqlite"))]
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let message = match &err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => "Unique constraint violation",
                sqlx::error::ErrorKind::ForeignKeyViolation => "Foreign key violation",
                sqlx::error::ErrorKind::CheckViolation => "Check constraint violation",
                sqlx::error::ErrorKind::NotNullViolation => "Not-null constraint violation",
                _ => "Query failed",
            },
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                return Self::connection("Connection lost").with_debug(err.to_string());
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => "Failed to decode row",
            _ => "Query failed",
        };
        Self::query(message).with_debug(err.to_string())
    }
}
