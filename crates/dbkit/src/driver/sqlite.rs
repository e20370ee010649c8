//! SQLite adapter over `sqlx`.

use super::{Driver, ExecOutcome, bind_values, sqlx_connect_error, sqlx_tx_error};
use crate::config::{ConnectionConfig, DialectKind, ResolvedConfig};
use crate::dialect::{SQLITE, SqlDialect};
use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::value::Value;
use libsqlite3_sys::{SQLITE_DBCONFIG_DQS_DDL, SQLITE_DBCONFIG_DQS_DML, SQLITE_OK, sqlite3_db_config};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column as _, ConnectOptions, Connection, Executor, Row as _, TypeInfo as _, ValueRef as _};
use std::os::raw::c_int;
use std::ptr;
use std::str::FromStr;

/// A single SQLite connection.
///
/// `":memory:"` opens a private in-memory database that lives as long as
/// the driver.
///
/// SQLite by default reads a double-quoted name that matches no column as a
/// string literal, so `"COUNT(*)"` or a misspelled `"stauts"` would silently
/// compare text instead of failing. [`Driver::connect`] turns that off
/// (`SQLITE_DBCONFIG_DQS_DML` / `_DDL`); set the `double_quoted_strings`
/// extra to `true` to keep the legacy behavior. Connections handed to
/// [`SqliteDriver::from_connection`] are used as they are.
pub struct SqliteDriver {
    conn: SqliteConnection,
}

impl SqliteDriver {
    /// Wrap an already-open connection.
    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self { conn }
    }

    /// Open a private in-memory database.
    pub async fn memory() -> DbResult<Self> {
        Self::connect(&ConnectionConfig::new().database(":memory:")).await
    }

    async fn control(&mut self, sql: &'static str, step: &str) -> DbResult<()> {
        Executor::execute(&mut self.conn, sql)
            .await
            .map(|_| ())
            .map_err(|e| sqlx_tx_error(step, e))
    }
}

async fn disable_double_quoted_strings(conn: &mut SqliteConnection) -> DbResult<()> {
    let mut handle = conn
        .lock_handle()
        .await
        .map_err(|e| sqlx_connect_error("SQLite", e))?;
    let db = handle.as_raw_handle().as_ptr();
    for op in [SQLITE_DBCONFIG_DQS_DML, SQLITE_DBCONFIG_DQS_DDL] {
        // SAFETY: `db` stays valid while `handle` holds the connection lock.
        let rc = unsafe { sqlite3_db_config(db, op, 0 as c_int, ptr::null_mut::<c_int>()) };
        if rc != SQLITE_OK {
            return Err(DbError::connection("Unable to configure SQLite connection")
                .with_debug(format!("sqlite3_db_config({op}) returned {rc}")));
        }
    }
    Ok(())
}

fn connect_options(resolved: &ResolvedConfig) -> DbResult<SqliteConnectOptions> {
    let mut options = if resolved.database == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| sqlx_connect_error("SQLite", e))?
    } else {
        SqliteConnectOptions::new()
            .filename(&resolved.database)
            .create_if_missing(resolved.extra_flag("create_if_missing")?.unwrap_or(true))
    };
    if let Some(enabled) = resolved.extra_flag("foreign_keys")? {
        options = options.foreign_keys(enabled);
    }
    Ok(options.disable_statement_logging())
}

impl Driver for SqliteDriver {
    const KIND: DialectKind = DialectKind::Sqlite;

    fn dialect() -> &'static dyn SqlDialect {
        &SQLITE
    }

    async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let resolved = config.resolve(Self::KIND)?;
        let legacy_strings = resolved.extra_flag("double_quoted_strings")?.unwrap_or(false);
        let mut conn = SqliteConnection::connect_with(&connect_options(&resolved)?)
            .await
            .map_err(|e| sqlx_connect_error("SQLite", e))?;
        if !legacy_strings {
            disable_double_quoted_strings(&mut conn).await?;
        }
        Ok(Self { conn })
    }

    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let query = bind_values!(sqlx::query(sql), params);
        let rows = query
            .fetch_all(&mut self.conn)
            .await
            .map_err(DbError::from_sqlx)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        let query = bind_values!(sqlx::query(sql), params);
        let result = query
            .execute(&mut self.conn)
            .await
            .map_err(DbError::from_sqlx)?;
        let last_insert_id = match result.last_insert_rowid() {
            0 => None,
            id => Some(id),
        };
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id,
        })
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.control("BEGIN", "begin").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.control("COMMIT", "commit").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.control("ROLLBACK", "roll back").await
    }
}

fn decode_row(row: &SqliteRow) -> DbResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_cell(row, column.ordinal()).map_err(|e| {
            DbError::query(format!("Failed to decode column '{}'", column.name()))
                .with_debug(e.to_string())
        })?;
        columns.push(column.name().to_string());
        values.push(value);
    }
    Ok(Row::new(columns, values))
}

// SQLite is dynamically typed; decode by the storage class of the value,
// not the declared column type.
fn decode_cell(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => Value::Int(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => Value::Text(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_by_storage_class() {
        let mut driver = SqliteDriver::memory().await.unwrap();
        let rows = driver
            .fetch_all(
                "SELECT 1 AS i, 1.5 AS r, 'x' AS t, x'0102' AS b, NULL AS n, ? AS p",
                &[Value::Bool(true)],
            )
            .await
            .unwrap();
        let row = &rows[0];
        assert_eq!(row.get("i"), Some(&Value::Int(1)));
        assert_eq!(row.get("r"), Some(&Value::Float(1.5)));
        assert_eq!(row.get("t"), Some(&Value::Text("x".into())));
        assert_eq!(row.get("b"), Some(&Value::Bytes(vec![1, 2])));
        assert_eq!(row.get("n"), Some(&Value::Null));
        assert_eq!(row.get("p"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn execute_reports_rowid() {
        let mut driver = SqliteDriver::memory().await.unwrap();
        driver
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await
            .unwrap();
        let outcome = driver
            .execute("INSERT INTO t (name) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap();
        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.last_insert_id, Some(1));
    }

    #[tokio::test]
    async fn raw_transaction_control() {
        let mut driver = SqliteDriver::memory().await.unwrap();
        driver.execute("CREATE TABLE t (v INTEGER)", &[]).await.unwrap();
        driver.begin().await.unwrap();
        driver.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
        driver.rollback().await.unwrap();
        let rows = driver.fetch_all("SELECT COUNT(*) AS c FROM t", &[]).await.unwrap();
        assert_eq!(rows[0].get("c"), Some(&Value::Int(0)));

        let err = driver.commit().await.unwrap_err();
        assert!(err.is_transaction());
    }

    #[tokio::test]
    async fn unknown_double_quoted_name_is_an_error() {
        let mut driver = SqliteDriver::memory().await.unwrap();
        driver.execute("CREATE TABLE t (status TEXT)", &[]).await.unwrap();
        driver
            .execute("INSERT INTO t VALUES ('paid')", &[])
            .await
            .unwrap();

        let err = driver
            .fetch_all(r#"SELECT * FROM t WHERE "stauts" = ?"#, &[Value::from("stauts")])
            .await
            .unwrap_err();
        assert!(err.is_query());
        assert!(err.debug_info().contains("stauts"));
    }

    #[tokio::test]
    async fn legacy_double_quoted_strings_can_be_kept() {
        let config = ConnectionConfig::new()
            .database(":memory:")
            .extra("double_quoted_strings", "true");
        let mut driver = SqliteDriver::connect(&config).await.unwrap();
        let rows = driver.fetch_all(r#"SELECT "COUNT(*)" AS v"#, &[]).await.unwrap();
        assert_eq!(rows[0].get("v"), Some(&Value::from("COUNT(*)")));
    }

    #[test]
    fn bad_flag_is_rejected() {
        let resolved = ConnectionConfig::new()
            .database("/tmp/dbkit.sqlite")
            .extra("create_if_missing", "perhaps")
            .resolve_with(DialectKind::Sqlite, |_| None)
            .unwrap();
        assert!(connect_options(&resolved).unwrap_err().is_connection());
    }
}
