//! Event hooks for SQL execution and transactions.
//!
//! Listeners are registered per [`Event`] and invoked synchronously, in
//! registration order, from the execution boundary of [`Database`](crate::Database).
//!
//! # Example
//!
//! ```rust,ignore
//! use dbkit::{Event, EventPayload};
//!
//! db.on(Event::Query, |p: &EventPayload| {
//!     println!("[{:?}] {}", p.duration, p.sql.as_deref().unwrap_or("-"));
//! });
//! ```

use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Named lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A statement finished successfully.
    Query,
    /// A statement or transaction step failed.
    Error,
    /// A transaction was opened.
    TransactionBegin,
    /// A transaction was committed.
    TransactionCommit,
    /// A transaction was rolled back.
    TransactionRollback,
}

impl Event {
    /// All events, in declaration order.
    pub const ALL: [Event; 5] = [
        Event::Query,
        Event::Error,
        Event::TransactionBegin,
        Event::TransactionCommit,
        Event::TransactionRollback,
    ];

    /// The event's wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Event::Query => "query",
            Event::Error => "error",
            Event::TransactionBegin => "transaction.begin",
            Event::TransactionCommit => "transaction.commit",
            Event::TransactionRollback => "transaction.rollback",
        }
    }

    /// Parse a wire name.
    pub fn parse(name: &str) -> Option<Event> {
        Event::ALL.into_iter().find(|e| e.as_str() == name)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, transaction control, anything else
    Other,
}

impl QueryType {
    /// Detect query type from the leading keyword.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or("");
        if keyword.eq_ignore_ascii_case("SELECT") || keyword.eq_ignore_ascii_case("WITH") {
            QueryType::Select
        } else if keyword.eq_ignore_ascii_case("INSERT") {
            QueryType::Insert
        } else if keyword.eq_ignore_ascii_case("UPDATE") {
            QueryType::Update
        } else if keyword.eq_ignore_ascii_case("DELETE") {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }
}

/// Structured payload passed to listeners.
#[derive(Debug, Clone)]
pub struct EventPayload {
    pub event: Event,
    /// Executed SQL, if the event concerns a statement.
    pub sql: Option<String>,
    /// Bound parameters.
    pub params: Vec<Value>,
    /// Wall-clock execution time.
    pub duration: Option<Duration>,
    /// Rows returned (SELECT) or affected (mutations).
    pub row_count: Option<u64>,
    /// Error detail for [`Event::Error`].
    pub error: Option<String>,
}

impl EventPayload {
    /// A payload with no statement attached.
    pub fn new(event: Event) -> Self {
        Self {
            event,
            sql: None,
            params: Vec::new(),
            duration: None,
            row_count: None,
            error: None,
        }
    }

    pub fn with_statement(mut self, sql: &str, params: &[Value]) -> Self {
        self.sql = Some(sql.to_string());
        self.params = params.to_vec();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Query type of the attached SQL.
    pub fn query_type(&self) -> Option<QueryType> {
        self.sql.as_deref().map(QueryType::from_sql)
    }
}

/// A registered event listener.
pub type Listener = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Observer list keyed by event.
#[derive(Clone, Default)]
pub struct EventHooks {
    listeners: Vec<(Event, Listener)>,
}

impl EventHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `event`.
    pub fn on<F>(&mut self, event: Event, listener: F)
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.listeners.push((event, Arc::new(listener)));
    }

    /// Register a shared listener for `event`.
    pub fn on_arc(&mut self, event: Event, listener: Listener) {
        self.listeners.push((event, listener));
    }

    /// Invoke every listener registered for `payload.event`, in order.
    pub fn emit(&self, payload: &EventPayload) {
        for (event, listener) in &self.listeners {
            if *event == payload.event {
                listener(payload);
            }
        }
    }

    /// Whether any listener is registered for `event`.
    pub fn has_listeners(&self, event: Event) -> bool {
        self.listeners.iter().any(|(e, _)| *e == event)
    }

    /// Number of listeners for `event`.
    pub fn listener_count(&self, event: Event) -> usize {
        self.listeners.iter().filter(|(e, _)| *e == event).count()
    }

    /// Drop every listener for `event`.
    pub fn clear(&mut self, event: Event) {
        self.listeners.retain(|(e, _)| *e != event);
    }
}

impl fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHooks")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(feature = "tracing")]
fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// A `tracing`-based listener that logs every event.
///
/// Queries go to target `dbkit.sql` at DEBUG, transactions to `dbkit.tx` at
/// DEBUG, errors to `dbkit.sql` at WARN. Parameters are never logged.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingHook {
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

#[cfg(feature = "tracing")]
impl Default for TracingHook {
    fn default() -> Self {
        Self {
            max_sql_length: Some(200),
        }
    }
}

#[cfg(feature = "tracing")]
impl TracingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn display_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    /// Log one event.
    pub fn handle(&self, payload: &EventPayload) {
        let sql = payload
            .sql
            .as_deref()
            .map(|s| self.display_sql(s))
            .unwrap_or_default();
        match payload.event {
            Event::Query => tracing::debug!(
                target: "dbkit.sql",
                query_type = ?payload.query_type(),
                duration_us = payload.duration.map(|d| d.as_micros() as u64),
                rows = payload.row_count,
                params = payload.params.len(),
                sql = %sql,
                "query"
            ),
            Event::Error => tracing::warn!(
                target: "dbkit.sql",
                error = payload.error.as_deref().unwrap_or("-"),
                sql = %sql,
                "query failed"
            ),
            Event::TransactionBegin | Event::TransactionCommit | Event::TransactionRollback => {
                tracing::debug!(target: "dbkit.tx", event = payload.event.as_str(), "transaction")
            }
        }
    }

    /// Register this hook for every event.
    pub fn install(self, hooks: &mut EventHooks) {
        let hook = Arc::new(self);
        for event in Event::ALL {
            let hook = Arc::clone(&hook);
            hooks.on(event, move |payload| hook.handle(payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn names_round_trip() {
        for event in Event::ALL {
            assert_eq!(Event::parse(event.as_str()), Some(event));
        }
        assert_eq!(Event::TransactionBegin.to_string(), "transaction.begin");
        assert_eq!(Event::parse("nope"), None);
    }

    #[test]
    fn query_type_detection() {
        assert_eq!(QueryType::from_sql("  select 1"), QueryType::Select);
        assert_eq!(QueryType::from_sql("(SELECT 1)"), QueryType::Select);
        assert_eq!(QueryType::from_sql("INSERT INTO t"), QueryType::Insert);
        assert_eq!(QueryType::from_sql("update t set"), QueryType::Update);
        assert_eq!(QueryType::from_sql("DELETE FROM t"), QueryType::Delete);
        assert_eq!(QueryType::from_sql("BEGIN"), QueryType::Other);
    }

    #[test]
    fn listeners_run_in_registration_order_per_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = EventHooks::new();
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            hooks.on(Event::Query, move |_| seen.lock().unwrap().push(tag));
        }
        let other = Arc::clone(&seen);
        hooks.on(Event::Error, move |_| other.lock().unwrap().push("error"));

        hooks.emit(&EventPayload::new(Event::Query));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(hooks.listener_count(Event::Query), 2);

        hooks.clear(Event::Query);
        assert!(!hooks.has_listeners(Event::Query));
        assert!(hooks.has_listeners(Event::Error));
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn truncate_respects_char_boundary() {
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        assert_eq!(truncate_sql_bytes("short", 10), "short");
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn tracing_hook_installs_for_every_event() {
        let mut hooks = EventHooks::new();
        TracingHook::new().max_sql_length(10).install(&mut hooks);
        for event in Event::ALL {
            assert_eq!(hooks.listener_count(event), 1);
        }
        hooks.emit(
            &EventPayload::new(Event::Query)
                .with_statement("SELECT * FROM very_long_table_name", &[])
                .with_row_count(3),
        );
    }
}
