use crate::error::AppError;
use crate::migrations;
use db_pool::{create_pool, DbConfig, PgPool};

/// Build the pool from `DB_*` settings and bring the schema up to date.
pub async fn init_pool(database_url: &str) -> Result<PgPool, AppError> {
    let cfg = DbConfig::from_env("messenger-service", database_url);
    cfg.log_config();

    let pool = create_pool(cfg)
        .await
        .map_err(|e| AppError::StartServer(format!("db: {e}")))?;
    migrations::run_all(&pool).await?;
    Ok(pool)
}
