//! The execution boundary: one connection, event hooks and CRUD helpers.
//!
//! Every statement issued through a [`Database`] (raw SQL, CRUD helpers and
//! the query builder alike) passes through [`Database::query`] or
//! [`Database::execute`], which time it, attach SQL and parameters to any
//! driver error and notify registered listeners.
//!
//! # Example
//!
//! ```ignore
//! use dbkit::{record, ConnectionConfig, Database, SqliteDriver};
//!
//! let mut db = Database::<SqliteDriver>::connect(&ConnectionConfig::new()).await?;
//! db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[]).await?;
//!
//! let id = db.insert_get_id("users", &record! { "name" => "alice" }, "id").await?;
//! let user = db.find_one("users", &record! { "id" => id }).await?;
//! ```

use crate::config::ConnectionConfig;
use crate::dialect::SqlDialect;
use crate::driver::{Driver, ExecOutcome};
use crate::error::{DbError, DbResult};
use crate::event::{Event, EventHooks, EventPayload};
use crate::qb::QueryBuilder;
use crate::row::Row;
use crate::value::{Record, Value};
use std::time::{Duration, Instant};

/// A connection plus event hooks.
///
/// Methods take `&mut self`: one caller at a time.
pub struct Database<D: Driver> {
    driver: D,
    hooks: EventHooks,
    pub(crate) in_transaction: bool,
}

impl<D: Driver> Database<D> {
    /// Open a connection from `config` (missing fields come from the
    /// environment).
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let driver = D::connect(config).await?;
        Ok(Self::from_driver(driver))
    }

    /// Wrap an already-connected driver.
    pub fn from_driver(driver: D) -> Self {
        Self {
            driver,
            hooks: EventHooks::new(),
            in_transaction: false,
        }
    }

    /// Register a listener for `event`.
    pub fn on<F>(&mut self, event: Event, listener: F) -> &mut Self
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.hooks.on(event, listener);
        self
    }

    /// Log every event through `tracing`.
    #[cfg(feature = "tracing")]
    pub fn with_tracing(mut self) -> Self {
        crate::event::TracingHook::new().install(&mut self.hooks);
        self
    }

    /// Registered listeners.
    pub fn hooks(&self) -> &EventHooks {
        &self.hooks
    }

    /// Registered listeners (mutable).
    pub fn hooks_mut(&mut self) -> &mut EventHooks {
        &mut self.hooks
    }

    /// The connection's SQL dialect.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        D::dialect()
    }

    /// The underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Consume the handle and return the driver.
    pub fn into_driver(self) -> D {
        self.driver
    }

    pub(crate) fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Emit `event` if anyone listens; `detail` fills in the payload.
    pub(crate) fn notify(&self, event: Event, detail: impl FnOnce(EventPayload) -> EventPayload) {
        if self.hooks.has_listeners(event) {
            self.hooks.emit(&detail(EventPayload::new(event)));
        }
    }

    fn fail(&self, err: DbError, sql: &str, params: &[Value], elapsed: Duration) -> DbError {
        let err = err.with_statement(sql, params);
        self.notify(Event::Error, |p| {
            p.with_statement(sql, params)
                .with_duration(elapsed)
                .with_error(err.to_string())
        });
        err
    }

    // ==================== Raw SQL ====================

    /// Run a statement and return its rows.
    pub async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let start = Instant::now();
        match self.driver.fetch_all(sql, params).await {
            Ok(rows) => {
                self.notify(Event::Query, |p| {
                    p.with_statement(sql, params)
                        .with_duration(start.elapsed())
                        .with_row_count(rows.len() as u64)
                });
                Ok(rows)
            }
            Err(err) => Err(self.fail(err, sql, params, start.elapsed())),
        }
    }

    /// Run a statement and return the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        Ok(self.execute_outcome(sql, params).await?.rows_affected)
    }

    /// Run a statement and return affected rows plus any generated id.
    pub async fn execute_outcome(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        let start = Instant::now();
        match self.driver.execute(sql, params).await {
            Ok(outcome) => {
                self.notify(Event::Query, |p| {
                    p.with_statement(sql, params)
                        .with_duration(start.elapsed())
                        .with_row_count(outcome.rows_affected)
                });
                Ok(outcome)
            }
            Err(err) => Err(self.fail(err, sql, params, start.elapsed())),
        }
    }

    // ==================== Builder ====================

    /// Start a query builder for `table` in this connection's dialect.
    pub fn table(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new(table, D::dialect())
    }

    /// A builder filtered by equality `conditions`; a `Null` value becomes
    /// `IS NULL`.
    fn filtered(&self, table: &str, conditions: &[(String, Value)]) -> QueryBuilder {
        conditions
            .iter()
            .fold(self.table(table), |qb, (column, value)| {
                if value.is_null() {
                    qb.where_null(column)
                } else {
                    qb.where_eq(column, value.clone())
                }
            })
    }

    // ==================== CRUD ====================

    /// INSERT one row; returns affected rows.
    pub async fn insert(&mut self, table: &str, data: &[(String, Value)]) -> DbResult<u64> {
        self.table(table).insert(self, data).await
    }

    /// INSERT one row and return the generated id from `id_column`.
    pub async fn insert_get_id(
        &mut self,
        table: &str,
        data: &[(String, Value)],
        id_column: &str,
    ) -> DbResult<Option<i64>> {
        self.table(table).insert_get_id(self, data, id_column).await
    }

    /// UPDATE rows matching `conditions`; empty conditions are refused.
    pub async fn update(
        &mut self,
        table: &str,
        data: &[(String, Value)],
        conditions: &[(String, Value)],
    ) -> DbResult<u64> {
        self.filtered(table, conditions).update(self, data).await
    }

    /// DELETE rows matching `conditions`; empty conditions are refused.
    pub async fn delete(&mut self, table: &str, conditions: &[(String, Value)]) -> DbResult<u64> {
        self.filtered(table, conditions).delete(self).await
    }

    /// First row matching `conditions`; at least one condition is required.
    pub async fn find_one(
        &mut self,
        table: &str,
        conditions: &[(String, Value)],
    ) -> DbResult<Option<Row>> {
        if conditions.is_empty() {
            return Err(DbError::query("find_one requires at least one condition")
                .with_debug(format!("table: {table}")));
        }
        self.filtered(table, conditions).first(self).await
    }

    /// Every row matching `conditions` (all rows when empty).
    pub async fn find_all(
        &mut self,
        table: &str,
        conditions: &[(String, Value)],
    ) -> DbResult<Vec<Row>> {
        self.filtered(table, conditions).get(self).await
    }

    /// UPDATE each record keyed by `key_column`; returns total affected rows.
    ///
    /// Runs in one transaction, or inside the already open one.
    pub async fn update_multiple(
        &mut self,
        table: &str,
        rows: &[Record],
        key_column: &str,
    ) -> DbResult<u64> {
        let mut updates = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let key = row
                .iter()
                .find(|(column, _)| column == key_column)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| {
                    DbError::query(format!("Row {i} has no key column '{key_column}'"))
                        .with_debug(format!("table: {table}"))
                })?;
            let data: Record = row
                .iter()
                .filter(|(column, _)| column != key_column)
                .cloned()
                .collect();
            if data.is_empty() {
                return Err(DbError::query(format!("Row {i} has no columns to update"))
                    .with_debug(format!("table: {table}, key column: {key_column}")));
            }
            updates.push((key, data));
        }

        self.transaction(async |db| {
            let mut total = 0;
            for (key, data) in &updates {
                total += db
                    .table(table)
                    .where_eq(key_column, key.clone())
                    .update(db, data)
                    .await?;
            }
            Ok(total)
        })
        .await
    }
}

impl<D: Driver> std::fmt::Debug for Database<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &D::dialect().name())
            .field("in_transaction", &self.in_transaction)
            .field("hooks", &self.hooks)
            .finish()
    }
}
