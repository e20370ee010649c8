//! MySQL adapter over `sqlx`.

use super::{Driver, ExecOutcome, bind_values, sqlx_connect_error, sqlx_tx_error};
use crate::config::{ConnectionConfig, DialectKind, ResolvedConfig};
use crate::dialect::{MYSQL, SqlDialect};
use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::value::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column as _, ConnectOptions, Connection, Executor, Row as _, TypeInfo as _, ValueRef as _};
use std::str::FromStr;

/// A single MySQL connection.
pub struct MySqlDriver {
    conn: MySqlConnection,
}

impl MySqlDriver {
    /// Wrap an already-open connection.
    pub fn from_connection(conn: MySqlConnection) -> Self {
        Self { conn }
    }

    /// Connect using a `mysql://` URL.
    pub async fn connect_url(database_url: &str) -> DbResult<Self> {
        let options = MySqlConnectOptions::from_str(database_url)
            .map_err(|e| sqlx_connect_error("MySQL", e))?
            .disable_statement_logging();
        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| sqlx_connect_error("MySQL", e))?;
        Ok(Self { conn })
    }

    async fn control(&mut self, sql: &'static str, step: &str) -> DbResult<()> {
        Executor::execute(&mut self.conn, sql)
            .await
            .map(|_| ())
            .map_err(|e| sqlx_tx_error(step, e))
    }
}

fn connect_options(resolved: &ResolvedConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&resolved.host)
        .port(resolved.port_or_default())
        .database(&resolved.database);
    if let Some(user) = resolved.username.as_deref() {
        options = options.username(user);
    }
    if let Some(password) = resolved.password.as_deref() {
        options = options.password(password);
    }
    if let Some(charset) = resolved.extra("charset") {
        options = options.charset(charset);
    }
    options.disable_statement_logging()
}

impl Driver for MySqlDriver {
    const KIND: DialectKind = DialectKind::MySql;

    fn dialect() -> &'static dyn SqlDialect {
        &MYSQL
    }

    async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let resolved = config.resolve(Self::KIND)?;
        let conn = MySqlConnection::connect_with(&connect_options(&resolved))
            .await
            .map_err(|e| sqlx_connect_error("MySQL", e))?;
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
        // LAST_INSERT_ID() is 0 when the statement generated no id.
        let last_insert_id = match result.last_insert_id() {
            0 => None,
            id => i64::try_from(id).ok(),
        };
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id,
        })
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.control("START TRANSACTION", "begin").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.control("COMMIT", "commit").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.control("ROLLBACK", "roll back").await
    }
}

fn decode_row(row: &MySqlRow) -> DbResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for column in row.columns() {
        let idx = column.ordinal();
        let value = decode_cell(row, idx, column.type_info().name()).map_err(|e| {
            DbError::query(format!(
                "Failed to decode column '{}' of type {}",
                column.name(),
                column.type_info().name()
            ))
            .with_debug(e.to_string())
        })?;
        columns.push(column.name().to_string());
        values.push(value);
    }
    Ok(Row::new(columns, values))
}

fn decode_cell(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }
    let value = match type_name {
        "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::Int(row.try_get_unchecked::<i64, _>(idx)?)
        }
        name if name.ends_with("UNSIGNED") => {
            let n = row.try_get_unchecked::<u64, _>(idx)?;
            i64::try_from(n).map_or_else(|_| Value::Text(n.to_string()), Value::Int)
        }
        "FLOAT" => Value::from(row.try_get_unchecked::<f32, _>(idx)?),
        "DOUBLE" => Value::Float(row.try_get_unchecked::<f64, _>(idx)?),
        "DECIMAL" => {
            let text = row.try_get_unchecked::<String, _>(idx)?;
            text.parse::<f64>().map_or(Value::Text(text), Value::Float)
        }
        "JSON" => {
            let text = row.try_get_unchecked::<String, _>(idx)?;
            serde_json::from_str(&text).map_or(Value::Text(text), Value::Json)
        }
        "BIT" | "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?)
        }
        "DATETIME" | "TIMESTAMP" => Value::Text(
            row.try_get_unchecked::<chrono::NaiveDateTime, _>(idx)?
                .to_string(),
        ),
        "DATE" => Value::Text(row.try_get_unchecked::<chrono::NaiveDate, _>(idx)?.to_string()),
        "TIME" => Value::Text(row.try_get_unchecked::<chrono::NaiveTime, _>(idx)?.to_string()),
        _ => Value::Text(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_resolved_config() {
        let resolved = ConnectionConfig::new()
            .host("db.internal")
            .database("shop")
            .username("shop")
            .password("secret")
            .extra("charset", "latin1")
            .resolve_with(DialectKind::MySql, |_| None)
            .unwrap();
        let options = connect_options(&resolved);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_database(), Some("shop"));
        assert_eq!(options.get_username(), "shop");
        assert_eq!(options.get_charset(), "latin1");
    }

    #[test]
    fn dialect_is_mysql() {
        assert_eq!(MySqlDriver::dialect().name(), "mysql");
        assert_eq!(MySqlDriver::dialect().placeholder(3), "?");
    }
}
