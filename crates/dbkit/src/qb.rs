//! Fluent query builder.
//!
//! A [`QueryBuilder`] accumulates clause descriptors and renders SQL only at
//! assembly time, so parameters always follow textual clause order: every
//! WHERE value comes before every HAVING value no matter which method was
//! called first.
//!
//! # Usage
//!
//! ```ignore
//! use dbkit::{qb, raw, SqliteDriver, Database};
//!
//! let mut db = Database::<SqliteDriver>::connect(&config).await?;
//!
//! // SELECT
//! let rows = db
//!     .table("users")
//!     .select(["id", "name"])
//!     .where_eq("status", "active")
//!     .where_cmp("age", ">=", 18)
//!     .order_by("created_at", "desc")
//!     .limit(20)
//!     .get(&mut db)
//!     .await?;
//!
//! // Aggregates ignore LIMIT/OFFSET/ORDER BY
//! let total = db.table("orders").where_eq("paid", true).count(&mut db).await?;
//!
//! // Render without executing
//! let (sql, params) = qb::table("orders", &dbkit::POSTGRES)
//!     .select([raw("user_id"), raw("SUM(total) as spent")])
//!     .group_by(["user_id"])
//!     .having(raw("SUM(total)"), ">", 100)
//!     .where_eq("status", "paid")
//!     .to_sql()?;
//! // params == [Text("paid"), Int(100)]
//! ```

mod exec;
mod select;

pub use exec::AGGREGATE_FUNCTIONS;
pub use select::{JoinKind, QueryBuilder, SortDirection};

use crate::dialect::SqlDialect;

/// Start a builder for `table` rendering with `dialect`.
pub fn table(table: &str, dialect: &'static dyn SqlDialect) -> QueryBuilder {
    QueryBuilder::new(table, dialect)
}
