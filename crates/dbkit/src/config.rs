//! Connection configuration with environment fallback.
//!
//! Every field resolves with the same precedence:
//!
//! 1. the explicit value in [`ConnectionConfig`]
//! 2. the generic `DB_*` environment variables
//! 3. the dialect's native environment variables (`PGHOST`, `MYSQL_PWD`, ...)
//! 4. a compiled default (`localhost`, port 5432 / 3306, `:memory:` for SQLite)
//!
//! # Example
//!
//! ```ignore
//! use dbkit::{ConnectionConfig, DialectKind};
//!
//! let config = ConnectionConfig::new().database("app").username("app");
//! let resolved = config.resolve(DialectKind::Postgres)?;
//! assert_eq!(resolved.port, Some(5432));
//! ```

use crate::error::{DbError, DbResult};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Which dialect a configuration is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    Postgres,
    MySql,
    Sqlite,
}

impl DialectKind {
    /// Compiled default port, if the dialect uses the network.
    pub fn default_port(self) -> Option<u16> {
        match self {
            DialectKind::Postgres => Some(5432),
            DialectKind::MySql => Some(3306),
            DialectKind::Sqlite => None,
        }
    }

    /// Dialect-native environment variable names, in field order
    /// `[host, port, database, username, password]`.
    fn native_env(self) -> [Option<&'static str>; 5] {
        match self {
            DialectKind::Postgres => [
                Some("PGHOST"),
                Some("PGPORT"),
                Some("PGDATABASE"),
                Some("PGUSER"),
                Some("PGPASSWORD"),
            ],
            DialectKind::MySql => [
                Some("MYSQL_HOST"),
                Some("MYSQL_TCP_PORT"),
                Some("MYSQL_DATABASE"),
                Some("MYSQL_USER"),
                Some("MYSQL_PWD"),
            ],
            DialectKind::Sqlite => [None, None, Some("SQLITE_DATABASE"), None, None],
        }
    }
}

const GENERIC_ENV: [&str; 5] = ["DB_HOST", "DB_PORT", "DB_DATABASE", "DB_USERNAME", "DB_PASSWORD"];

/// User-supplied connection settings. Every field is optional; missing
/// fields are filled from the environment on [`resolve`](Self::resolve).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Dialect-specific options (`application_name`, `charset`, `foreign_keys`, ...).
    pub extras: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// Create an empty configuration (everything from the environment).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML.
    ///
    /// ```toml
    /// host = "db.internal"
    /// port = 5433
    /// database = "app"
    /// username = "app"
    ///
    /// [extras]
    /// application_name = "worker"
    /// ```
    pub fn from_toml_str(input: &str) -> DbResult<Self> {
        toml::from_str(input).map_err(|e| {
            DbError::connection("Invalid connection configuration").with_debug(e.to_string())
        })
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set a dialect-specific option.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Resolve against the process environment.
    pub fn resolve(&self, kind: DialectKind) -> DbResult<ResolvedConfig> {
        self.resolve_with(kind, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary variable lookup.
    pub fn resolve_with<F>(&self, kind: DialectKind, lookup: F) -> DbResult<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let native = kind.native_env();
        let env = |field: usize| -> Option<String> {
            lookup(GENERIC_ENV[field])
                .filter(|v| !v.is_empty())
                .or_else(|| native[field].and_then(&lookup).filter(|v| !v.is_empty()))
        };

        let host = self
            .host
            .clone()
            .or_else(|| env(0))
            .unwrap_or_else(|| "localhost".to_string());

        let port = match self.port {
            Some(port) => Some(port),
            None => match env(1) {
                Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                    DbError::connection(format!("Invalid port '{raw}'")).with_debug(e.to_string())
                })?),
                None => kind.default_port(),
            },
        };

        let database = self.database.clone().or_else(|| env(2));
        let username = self.username.clone().or_else(|| env(3));
        let password = self.password.clone().or_else(|| env(4));

        let database = match kind {
            DialectKind::Sqlite => database.unwrap_or_else(|| ":memory:".to_string()),
            DialectKind::Postgres | DialectKind::MySql => database.ok_or_else(|| {
                DbError::connection("Database name is not configured").with_debug(format!(
                    "set it explicitly or via {} / {}",
                    GENERIC_ENV[2],
                    native[2].unwrap_or("-")
                ))
            })?,
        };

        if kind != DialectKind::Sqlite && username.is_none() {
            return Err(
                DbError::connection("Database username is not configured").with_debug(format!(
                    "set it explicitly or via {} / {}",
                    GENERIC_ENV[3],
                    native[3].unwrap_or("-")
                )),
            );
        }

        Ok(ResolvedConfig {
            kind,
            host,
            port,
            database,
            username,
            password,
            extras: self.extras.clone(),
        })
    }
}

/// A fully resolved configuration, ready for a driver.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub kind: DialectKind,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub extras: BTreeMap<String, String>,
}

impl ResolvedConfig {
    /// Look up a dialect-specific option.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }

    /// Parse a boolean option (`true/false/1/0/yes/no/on/off`).
    pub fn extra_flag(&self, key: &str) -> DbResult<Option<bool>> {
        match self.extra(key) {
            None => Ok(None),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(DbError::connection(format!(
                    "Invalid boolean for option '{key}': '{raw}'"
                ))),
            },
        }
    }

    /// Port, falling back to the dialect default.
    pub fn port_or_default(&self) -> u16 {
        self.port
            .or_else(|| self.kind.default_port())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("extras", &self.extras)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_beats_environment() {
        let config = ConnectionConfig::new().host("explicit").database("app").username("u");
        let resolved = config
            .resolve_with(
                DialectKind::Postgres,
                env(&[("DB_HOST", "generic"), ("PGHOST", "native")]),
            )
            .unwrap();
        assert_eq!(resolved.host, "explicit");
    }

    #[test]
    fn generic_env_beats_native_env() {
        let resolved = ConnectionConfig::new()
            .resolve_with(
                DialectKind::Postgres,
                env(&[
                    ("DB_HOST", "generic"),
                    ("PGHOST", "native"),
                    ("PGDATABASE", "native_db"),
                    ("PGUSER", "native_user"),
                ]),
            )
            .unwrap();
        assert_eq!(resolved.host, "generic");
        assert_eq!(resolved.database, "native_db");
        assert_eq!(resolved.username.as_deref(), Some("native_user"));
    }

    #[test]
    fn defaults_apply_last() {
        let resolved = ConnectionConfig::new()
            .database("app")
            .username("root")
            .resolve_with(DialectKind::MySql, env(&[]))
            .unwrap();
        assert_eq!(resolved.host, "localhost");
        assert_eq!(resolved.port, Some(3306));
        assert_eq!(resolved.password, None);

        let resolved = ConnectionConfig::new()
            .resolve_with(DialectKind::Sqlite, env(&[]))
            .unwrap();
        assert_eq!(resolved.database, ":memory:");
        assert_eq!(resolved.port, None);
    }

    #[test]
    fn native_mysql_env_is_used() {
        let resolved = ConnectionConfig::new()
            .resolve_with(
                DialectKind::MySql,
                env(&[
                    ("MYSQL_TCP_PORT", "3307"),
                    ("MYSQL_DATABASE", "shop"),
                    ("MYSQL_USER", "shop"),
                    ("MYSQL_PWD", "secret"),
                ]),
            )
            .unwrap();
        assert_eq!(resolved.port, Some(3307));
        assert_eq!(resolved.password.as_deref(), Some("secret"));
    }

    #[test]
    fn missing_database_is_connection_error() {
        let err = ConnectionConfig::new()
            .username("u")
            .resolve_with(DialectKind::Postgres, env(&[]))
            .unwrap_err();
        assert!(err.is_connection());
        assert!(err.debug_info().contains("PGDATABASE"));
    }

    #[test]
    fn bad_port_is_connection_error() {
        let err = ConnectionConfig::new()
            .database("app")
            .username("u")
            .resolve_with(DialectKind::Postgres, env(&[("DB_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn loads_from_toml() {
        let config = ConnectionConfig::from_toml_str(
            r#"
            host = "db.internal"
            port = 5433
            database = "app"

            [extras]
            application_name = "worker"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, Some(5433));
        assert_eq!(config.extras.get("application_name").map(String::as_str), Some("worker"));
        assert!(ConnectionConfig::from_toml_str("port = 'x'").is_err());
    }

    #[test]
    fn extra_flags_and_redacted_debug() {
        let resolved = ConnectionConfig::new()
            .password("hunter2")
            .extra("foreign_keys", "on")
            .extra("bogus", "maybe")
            .resolve_with(DialectKind::Sqlite, env(&[]))
            .unwrap();
        assert_eq!(resolved.extra_flag("foreign_keys").unwrap(), Some(true));
        assert_eq!(resolved.extra_flag("missing").unwrap(), None);
        assert!(resolved.extra_flag("bogus").is_err());
        assert!(!format!("{resolved:?}").contains("hunter2"));
    }
}
