//! `PostgreSQL` connection pool and configuration.
//!
//! The `fits` schema is owned and migrated elsewhere; this crate only reads
//! it and writes sites and observations. Queries are built at runtime (not
//! compile-time checked) so no live database is needed at build time, and
//! every query is parameterized.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use crate::error::DbError;

/// Default maximum number of open connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 30;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default idle timeout in seconds.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Server-side statement timeout applied to every connection.
const STATEMENT_TIMEOUT_MS: u64 = 600_000;

/// Configuration for the `PostgreSQL` connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Role to connect as.
    pub user: String,
    /// Password for `user`.
    pub password: String,
    /// Database name.
    pub database: String,
    /// TLS mode, e.g. `disable` or `require`.
    pub ssl_mode: String,
    /// Maximum number of open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// Connection (and pool acquire) timeout.
    pub connect_timeout: Duration,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            user: "fits_r".to_owned(),
            password: String::new(),
            database: "fits".to_owned(),
            ssl_mode: "disable".to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 0,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl PostgresConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DB_HOST` | `localhost` |
    /// | `DB_PORT` | `5432` |
    /// | `DB_CONN_TIMEOUT` | `5` (seconds) |
    /// | `DB_USER` | `fits_r` |
    /// | `DB_PASSWD` | empty |
    /// | `DB_NAME` | `fits` |
    /// | `DB_SSLMODE` | `disable` |
    /// | `DB_MAX_OPEN` | `30` |
    /// | `DB_MAX_IDLE` | `30` |
    ///
    /// `sqlx` pools have no separate idle cap, so `DB_MAX_IDLE` sets the
    /// number of connections kept warm, bounded by `DB_MAX_OPEN`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if a numeric variable does not parse or
    /// `DB_SSLMODE` is not a known mode.
    pub fn from_env() -> Result<Self, DbError> {
        let d = Self::default();

        let timeout: u64 = env_parse("DB_CONN_TIMEOUT", DEFAULT_CONNECT_TIMEOUT_SECS)?;
        let max_open: u32 = env_parse("DB_MAX_OPEN", DEFAULT_MAX_CONNECTIONS)?;
        let max_idle: u32 = env_parse("DB_MAX_IDLE", DEFAULT_MAX_CONNECTIONS)?;

        let config = Self {
            host: env_or("DB_HOST", &d.host),
            port: env_parse("DB_PORT", d.port)?,
            user: env_or("DB_USER", &d.user),
            password: env_or("DB_PASSWD", &d.password),
            database: env_or("DB_NAME", &d.database),
            ssl_mode: env_or("DB_SSLMODE", &d.ssl_mode),
            max_connections: max_open.max(1),
            min_connections: max_idle.min(max_open),
            connect_timeout: Duration::from_secs(timeout),
            idle_timeout: d.idle_timeout,
        };

        // Surface a bad mode at startup rather than on first connect.
        config.ssl()?;
        Ok(config)
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn ssl(&self) -> Result<PgSslMode, DbError> {
        self.ssl_mode
            .parse()
            .map_err(|e: sqlx::Error| DbError::Config(format!("invalid DB_SSLMODE {}: {e}", self.ssl_mode)))
    }

    /// Connection options for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the TLS mode is invalid.
    pub fn connect_options(&self) -> Result<PgConnectOptions, DbError> {
        let statement_timeout = STATEMENT_TIMEOUT_MS.to_string();
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(self.ssl()?)
            .application_name("fits")
            .options([("statement_timeout", statement_timeout.as_str())]))
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, DbError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v
            .parse()
            .map_err(|e| DbError::Config(format!("invalid {key} {v}: {e}"))),
        _ => Ok(default),
    }
}

/// Connection pool handle to `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Connect to `PostgreSQL` and verify the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the connection fails.
    /// Returns [`DbError::Config`] if the configuration is invalid.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, DbError> {
        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await?;

        tracing::info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }

    /// Create a pool that connects on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the configuration is invalid.
    pub fn connect_lazy(config: &PostgresConfig) -> Result<Self, DbError> {
        let pool = config.pool_options().connect_lazy_with(config.connect_options()?);
        Ok(Self { pool })
    }

    /// Run `SELECT 1`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the database cannot be reached.
    pub async fn ping(&self) -> Result<(), DbError> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Return a reference to the underlying [`PgPool`].
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}
