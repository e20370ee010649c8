//! # dbkit
//!
//! A thin multi-dialect SQL layer for PostgreSQL, MySQL and SQLite.
//!
//! ## Features
//!
//! - **Driver adapters**: one [`Driver`] per dialect, selected by cargo feature
//! - **CRUD helpers**: `insert`, `update`, `delete`, `find_one`, `find_all` on [`Database`]
//! - **Fluent query builder**: WHERE/JOIN/GROUP BY/HAVING/ORDER BY/LIMIT with
//!   parameters always bound in textual order (WHERE before HAVING)
//! - **Safe defaults**: identifiers are quoted, operators are whitelisted,
//!   UPDATE and DELETE require a WHERE clause
//! - **Transactions**: `transaction(async |db| ...)` commits on `Ok`, rolls back on `Err`
//! - **Event hooks**: listeners for queries, errors and transaction steps;
//!   `tracing` output behind the `tracing` feature
//!
//! ## Query Builder
//!
//! ```ignore
//! use dbkit::{raw, record, ConnectionConfig, Database, SqliteDriver};
//!
//! let mut db = Database::<SqliteDriver>::connect(&ConnectionConfig::new()).await?;
//!
//! db.insert("users", &record! { "name" => "alice", "age" => 31 }).await?;
//!
//! let adults = db
//!     .table("users")
//!     .where_cmp("age", ">=", 18)
//!     .order_by("name", "asc")
//!     .get(&mut db)
//!     .await?;
//!
//! let busiest = db
//!     .table("orders")
//!     .select([raw("user_id"), raw("COUNT(*) as n")])
//!     .group_by(["user_id"])
//!     .having(raw("COUNT(*)"), ">", 5)
//!     .get(&mut db)
//!     .await?;
//! ```

pub mod condition;
pub mod config;
pub mod database;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod event;
pub mod ident;
pub mod qb;
pub mod row;
pub mod sql;
pub mod transaction;
pub mod value;

pub use condition::{ALLOWED_OPERATORS, Clause, validate_operator};
pub use config::{ConnectionConfig, DialectKind, ResolvedConfig};
pub use database::Database;
pub use dialect::{MYSQL, MySqlDialect, POSTGRES, PostgresDialect, SQLITE, SqlDialect, SqliteDialect};
pub use driver::{Driver, ExecOutcome};
pub use error::{DbError, DbResult};
pub use event::{Event, EventHooks, EventPayload, Listener, QueryType};
pub use ident::{Column, quote_identifier, raw};
pub use qb::{JoinKind, QueryBuilder, SortDirection};
pub use row::{FromValue, Row};
pub use sql::SqlWriter;
pub use value::{Record, Value};

#[cfg(feature = "tracing")]
pub use event::TracingHook;

#[cfg(feature = "postgres")]
pub use driver::postgres::PostgresDriver;

#[cfg(feature = "mysql")]
pub use driver::mysql::MySqlDriver;

#[cfg(feature = "sqlite")]
pub use driver::sqlite::SqliteDriver;
