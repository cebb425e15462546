use deadpool_postgres::Pool;

// Embedded at compile time; every statement is idempotent
const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../migrations/0001_init.sql"))];

pub async fn run_all(pool: &Pool) -> Result<(), crate::error::AppError> {
    let client = pool.get().await?;
    for (label, sql) in MIGRATIONS {
        client.batch_execute(sql).await?;
        tracing::info!(migration = %label, "messenger-service migration applied");
    }
    Ok(())
}
