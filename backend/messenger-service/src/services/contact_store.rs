use crate::error::AppResult;
use async_trait::async_trait;
use deadpool_postgres::Pool;

/// Directed contact edges `owner -> target`. Each direction is its own row.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Returns `true` when the edge was created, `false` when it already existed.
    async fn insert_edge(&self, owner_id: i64, target_id: i64) -> AppResult<bool>;

    /// Returns `true` when an edge was removed.
    async fn delete_edge(&self, owner_id: i64, target_id: i64) -> AppResult<bool>;

    /// `(a -> b exists, b -> a exists)`
    async fn edges_between(&self, a: i64, b: i64) -> AppResult<(bool, bool)>;

    /// Users `owner_id` has added, oldest edge first.
    async fn targets_of(&self, owner_id: i64) -> AppResult<Vec<i64>>;

    /// Users that have added `target_id`, oldest edge first.
    async fn owners_of(&self, target_id: i64) -> AppResult<Vec<i64>>;
}

pub struct PgContactStore {
    pool: Pool,
}

impl PgContactStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn insert_edge(&self, owner_id: i64, target_id: i64) -> AppResult<bool> {
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                r#"
                INSERT INTO contacts (owner_id, target_id)
                VALUES ($1, $2)
                ON CONFLICT (owner_id, target_id) DO NOTHING
                "#,
                &[&owner_id, &target_id],
            )
            .await?;

        Ok(inserted > 0)
    }

    async fn delete_edge(&self, owner_id: i64, target_id: i64) -> AppResult<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(
                "DELETE FROM contacts WHERE owner_id = $1 AND target_id = $2",
                &[&owner_id, &target_id],
            )
            .await?;

        Ok(deleted > 0)
    }

    async fn edges_between(&self, a: i64, b: i64) -> AppResult<(bool, bool)> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                SELECT
                    EXISTS(SELECT 1 FROM contacts WHERE owner_id = $1 AND target_id = $2) AS a_to_b,
                    EXISTS(SELECT 1 FROM contacts WHERE owner_id = $2 AND target_id = $1) AS b_to_a
                "#,
                &[&a, &b],
            )
            .await?;

        Ok((row.get("a_to_b"), row.get("b_to_a")))
    }

    async fn targets_of(&self, owner_id: i64) -> AppResult<Vec<i64>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT target_id FROM contacts WHERE owner_id = $1 ORDER BY created_at, target_id",
                &[&owner_id],
            )
            .await?;

        Ok(rows.iter().map(|r| r.get("target_id")).collect())
    }

    async fn owners_of(&self, target_id: i64) -> AppResult<Vec<i64>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT owner_id FROM contacts WHERE target_id = $1 ORDER BY created_at, owner_id",
                &[&target_id],
            )
            .await?;

        Ok(rows.iter().map(|r| r.get("owner_id")).collect())
    }
}
