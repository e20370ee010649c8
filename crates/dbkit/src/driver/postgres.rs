//! PostgreSQL adapter over `tokio-postgres`.

use super::{Driver, ExecOutcome};
use crate::config::{ConnectionConfig, DialectKind, ResolvedConfig};
use crate::dialect::{POSTGRES, SqlDialect};
use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType};
use tokio_postgres::{Client, NoTls};

/// A single PostgreSQL connection.
///
/// The connection task is spawned onto the current tokio runtime.
pub struct PostgresDriver {
    client: Client,
}

impl PostgresDriver {
    /// Wrap an already-connected client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Connect using a `postgres://` URL or key/value connection string.
    pub async fn connect_url(database_url: &str) -> DbResult<Self> {
        let pg_config: tokio_postgres::Config = database_url.parse().map_err(|e: tokio_postgres::Error| {
            DbError::connection("Invalid PostgreSQL connection string").with_debug(e.to_string())
        })?;
        Self::connect_config(pg_config).await
    }

    async fn connect_config(pg_config: tokio_postgres::Config) -> DbResult<Self> {
        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            DbError::connection("Unable to connect to PostgreSQL").with_debug(e.to_string())
        })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                #[cfg(feature = "tracing")]
                tracing::error!(target: "dbkit.postgres", error = %e, "connection error");
                #[cfg(not(feature = "tracing"))]
                let _ = e;
            }
        });
        Ok(Self { client })
    }

    /// Access the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn batch(&self, sql: &str, step: &str) -> DbResult<()> {
        self.client.batch_execute(sql).await.map_err(|e| {
            DbError::transaction(format!("Failed to {step} transaction")).with_debug(e.to_string())
        })
    }
}

fn pg_config(resolved: &ResolvedConfig) -> DbResult<tokio_postgres::Config> {
    let mut config = tokio_postgres::Config::new();
    config
        .host(resolved.host.as_str())
        .port(resolved.port_or_default())
        .dbname(resolved.database.as_str());
    if let Some(user) = resolved.username.as_deref() {
        config.user(user);
    }
    if let Some(password) = resolved.password.as_deref() {
        config.password(password);
    }
    if let Some(name) = resolved.extra("application_name") {
        config.application_name(name);
    }
    if let Some(raw) = resolved.extra("connect_timeout") {
        let secs: u64 = raw.parse().map_err(|_| {
            DbError::connection(format!("Invalid connect_timeout '{raw}'"))
        })?;
        config.connect_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

impl Driver for PostgresDriver {
    const KIND: DialectKind = DialectKind::Postgres;

    fn dialect() -> &'static dyn SqlDialect {
        &POSTGRES
    }

    async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let resolved = config.resolve(Self::KIND)?;
        Self::connect_config(pg_config(&resolved)?).await
    }

    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let refs = param_refs(params);
        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(DbError::from_postgres)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        let refs = param_refs(params);
        let rows_affected = self
            .client
            .execute(sql, &refs)
            .await
            .map_err(DbError::from_postgres)?;
        Ok(ExecOutcome {
            rows_affected,
            last_insert_id: None,
        })
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.batch("BEGIN", "begin").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.batch("COMMIT", "commit").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.batch("ROLLBACK", "roll back").await
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

type BindResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

fn wrong_type(ty: &Type) -> Box<dyn Error + Sync + Send> {
    Box::new(WrongType::new::<Value>(ty.clone()))
}

fn is_text(ty: &Type) -> bool {
    <&str as ToSql>::accepts(ty)
}

fn bind_int(i: i64, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        Type::OID => u32::try_from(i)?.to_sql(ty, out),
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(i).to_sql(ty, out),
        Type::BOOL => (i != 0).to_sql(ty, out),
        _ if is_text(ty) => i.to_string().as_str().to_sql(ty, out),
        _ => Err(wrong_type(ty)),
    }
}

fn bind_float(f: f64, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::FLOAT8 => f.to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(f)?.to_sql(ty, out),
        // Only whole numbers go into integer slots.
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                bind_int(f as i64, ty, out)
            } else {
                Err(format!("{f} is not a whole number and cannot be bound as {ty}").into())
            }
        }
        _ if is_text(ty) => f.to_string().as_str().to_sql(ty, out),
        _ => Err(wrong_type(ty)),
    }
}

fn bind_text(s: &str, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        _ if is_text(ty) => s.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => bind_int(s.trim().parse()?, ty, out),
        Type::FLOAT4 | Type::FLOAT8 => bind_float(s.trim().parse()?, ty, out),
        Type::NUMERIC => Decimal::from_str(s.trim())?.to_sql(ty, out),
        Type::BOOL => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => true.to_sql(ty, out),
            "f" | "false" | "0" => false.to_sql(ty, out),
            _ => Err(format!("'{s}' is not a boolean").into()),
        },
        Type::DATE => s.parse::<NaiveDate>()?.to_sql(ty, out),
        Type::TIME => s.parse::<NaiveTime>()?.to_sql(ty, out),
        Type::TIMESTAMP => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| s.parse::<NaiveDateTime>())?
            .to_sql(ty, out),
        Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(s)?
            .with_timezone(&Utc)
            .to_sql(ty, out),
        _ => Err(wrong_type(ty)),
    }
}

// Every (value, type) pair is converted explicitly; anything else is a
// `WrongType` error instead of bytes in a foreign wire format.
impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> BindResult {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ if is_text(ty) => b.to_string().as_str().to_sql(ty, out),
                _ => Err(wrong_type(ty)),
            },
            Value::Int(i) => bind_int(*i, ty, out),
            Value::Float(f) => bind_float(*f, ty, out),
            Value::Text(s) => bind_text(s, ty, out),
            Value::Bytes(b) => match *ty {
                Type::BYTEA => b.as_slice().to_sql(ty, out),
                _ => Err(wrong_type(ty)),
            },
            Value::Json(j) => match *ty {
                Type::JSON | Type::JSONB => j.to_sql(ty, out),
                _ if is_text(ty) => j.to_string().as_str().to_sql(ty, out),
                _ => Err(wrong_type(ty)),
            },
        }
    }

    // The variant decides; unsupported pairs fail in `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn decode_row(row: &tokio_postgres::Row) -> DbResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, idx, column.type_()).map_err(|e| {
            DbError::query(format!(
                "Failed to decode column '{}' of type {}",
                column.name(),
                column.type_()
            ))
            .with_debug(e.to_string())
        })?;
        columns.push(column.name().to_string());
        values.push(value);
    }
    Ok(Row::new(columns, values))
}

fn decode_cell(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map(|d| d.to_f64().map_or_else(|| Value::Text(d.to_string()), Value::Float)),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Bytes),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<serde_json::Value>>(idx)?.map(Value::Json),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|t| Value::Text(t.to_string())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|t| Value::Text(t.to_rfc3339())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|t| Value::Text(t.to_string())),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|t| Value::Text(t.to_string())),
        _ => row.try_get::<_, Option<String>>(idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_adapts_to_inferred_width() {
        let mut out = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT4, &mut out).unwrap();
        assert_eq!(&out[..], &7i32.to_be_bytes());

        let mut out = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT8, &mut out).unwrap();
        assert_eq!(&out[..], &7i64.to_be_bytes());
    }

    fn bind(value: Value, ty: &Type) -> Result<Vec<u8>, Box<dyn Error + Sync + Send>> {
        let mut out = BytesMut::new();
        value.to_sql(ty, &mut out)?;
        Ok(out.to_vec())
    }

    #[test]
    fn float_binds_to_integer_slot_only_when_whole() {
        assert_eq!(bind(Value::Float(3.0), &Type::INT8).unwrap(), 3i64.to_be_bytes());
        assert_eq!(bind(Value::Float(3.0), &Type::INT4).unwrap(), 3i32.to_be_bytes());
        assert!(bind(Value::Float(2.5), &Type::INT8).is_err());
        assert!(bind(Value::Float(f64::NAN), &Type::INT4).is_err());
        assert!(bind(Value::Float(1e300), &Type::INT8).is_err());
    }

    #[test]
    fn text_is_parsed_into_numeric_slots() {
        assert_eq!(bind(Value::from("5"), &Type::INT4).unwrap(), 5i32.to_be_bytes());
        assert_eq!(bind(Value::from("1.5"), &Type::FLOAT8).unwrap(), 1.5f64.to_be_bytes());
        assert_eq!(bind(Value::from("t"), &Type::BOOL).unwrap(), [1]);
        assert!(bind(Value::from("five"), &Type::INT4).is_err());
        assert!(bind(Value::from("maybe"), &Type::BOOL).is_err());
    }

    #[test]
    fn numbers_bind_to_text_slots_as_text() {
        assert_eq!(bind(Value::Int(5), &Type::TEXT).unwrap(), b"5");
        assert_eq!(bind(Value::Float(2.5), &Type::VARCHAR).unwrap(), b"2.5");
        assert_eq!(bind(Value::Bool(true), &Type::TEXT).unwrap(), b"true");
    }

    #[test]
    fn temporal_text_round_trips_decoded_format() {
        let stamp = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let mut expected = BytesMut::new();
        stamp.to_sql(&Type::TIMESTAMP, &mut expected).unwrap();
        assert_eq!(
            bind(Value::Text(stamp.to_string()), &Type::TIMESTAMP).unwrap(),
            expected.to_vec()
        );
        assert!(bind(Value::from("2024-03-01"), &Type::DATE).is_ok());
    }

    #[test]
    fn unsupported_pairs_are_wrong_type() {
        let err = bind(Value::Bytes(vec![1]), &Type::INT4).unwrap_err();
        assert!(err.is::<WrongType>());
        assert!(bind(Value::Int(1), &Type::BYTEA).unwrap_err().is::<WrongType>());
        assert!(bind(Value::Bool(true), &Type::INT8).unwrap_err().is::<WrongType>());
        assert!(bind(Value::from("x"), &Type::POINT).unwrap_err().is::<WrongType>());
    }

    #[test]
    fn int_out_of_range_is_an_error() {
        let mut out = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql(&Type::INT2, &mut out).is_err());
    }

    #[test]
    fn null_is_null() {
        let mut out = BytesMut::new();
        assert!(matches!(
            Value::Null.to_sql(&Type::TEXT, &mut out).unwrap(),
            IsNull::Yes
        ));
    }

    #[test]
    fn config_maps_extras() {
        let resolved = ConnectionConfig::new()
            .database("app")
            .username("app")
            .extra("application_name", "worker")
            .extra("connect_timeout", "5")
            .resolve_with(DialectKind::Postgres, |_| None)
            .unwrap();
        let config = pg_config(&resolved).unwrap();
        assert_eq!(config.get_dbname(), Some("app"));
        assert_eq!(config.get_ports(), &[5432]);
        assert_eq!(config.get_application_name(), Some("worker"));
        assert_eq!(config.get_connect_timeout(), Some(&Duration::from_secs(5)));
    }

    #[test]
    fn config_rejects_bad_timeout() {
        let resolved = ConnectionConfig::new()
            .database("app")
            .username("app")
            .extra("connect_timeout", "soon")
            .resolve_with(DialectKind::Postgres, |_| None)
            .unwrap();
        assert!(pg_config(&resolved).unwrap_err().is_connection());
    }
}
