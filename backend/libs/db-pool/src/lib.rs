//! Database connection pool management
//!
//! Builds a verified deadpool-postgres pool from environment configuration.

use deadpool_postgres::tokio_postgres::{Config as PgConfig, NoTls};
use deadpool_postgres::{BuildError, Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
pub use deadpool_postgres::PoolError;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub type PgPool = Pool;

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("invalid database url: {0}")]
    InvalidUrl(#[source] tokio_postgres::Error),

    #[error("failed to build pool: {0}")]
    Build(#[from] BuildError),

    #[error("database unreachable: {0}")]
    Connect(#[from] PoolError),

    #[error("database verification query failed: {0}")]
    Verify(#[source] tokio_postgres::Error),

    #[error("database connection verification timed out after {0}s")]
    Timeout(u64),
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Service name used in log lines
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of pooled connections
    pub max_connections: usize,
    /// Timeout for establishing a new connection
    pub connect_timeout_secs: u64,
    /// Timeout for waiting on a free pooled connection
    pub acquire_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            max_connections: 16,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl DbConfig {
    /// Read pool settings from `DB_*` variables. The URL is supplied by the caller.
    pub fn from_env(service_name: &str, database_url: &str) -> Self {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            database_url: database_url.to_string(),
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout_secs),
        }
    }

    pub fn log_config(&self) {
        info!(
            service = %self.service_name,
            max_connections = self.max_connections,
            connect_timeout_secs = self.connect_timeout_secs,
            acquire_timeout_secs = self.acquire_timeout_secs,
            "database pool configuration"
        );
    }
}

/// Build a deadpool-postgres pool and verify it with `SELECT 1`.
pub async fn create_pool(config: DbConfig) -> Result<PgPool, DbPoolError> {
    debug!(
        service = %config.service_name,
        max = config.max_connections,
        "creating database pool"
    );

    let pg_config: PgConfig = config.database_url.parse().map_err(DbPoolError::InvalidUrl)?;

    let mgr = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(mgr)
        .max_size(config.max_connections)
        .runtime(Runtime::Tokio1)
        .create_timeout(Some(Duration::from_secs(config.connect_timeout_secs)))
        .wait_timeout(Some(Duration::from_secs(config.acquire_timeout_secs)))
        .build()?;

    let verify = async {
        let client = pool.get().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(DbPoolError::Verify)?;
        Ok::<(), DbPoolError>(())
    };

    match tokio::time::timeout(Duration::from_secs(config.connect_timeout_secs), verify).await {
        Ok(Ok(())) => {
            info!(service = %config.service_name, "database pool created and verified");
            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(service = %config.service_name, error = %e, "database verification failed");
            Err(e)
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.connect_timeout_secs,
                "database verification timed out"
            );
            Err(DbPoolError::Timeout(config.connect_timeout_secs))
        }
    }
}
