use crate::error::{AppError, AppResult};
use crate::models::User;
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use uuid::Uuid;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new account. A taken username is `AppError::Conflict`.
    async fn create(&self, username: &str, password_hash: &str) -> AppResult<User>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;

    async fn find_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Users for the given ids, in the order the ids were given. Unknown ids are skipped.
    async fn find_many(&self, ids: &[i64]) -> AppResult<Vec<User>>;

    /// Case-insensitive username prefix match, excluding `exclude_id`.
    async fn search(&self, prefix: &str, exclude_id: i64, limit: i64) -> AppResult<Vec<User>>;
}

pub fn username_taken(username: &str) -> AppError {
    AppError::Conflict(format!("{username} is not available."))
}

/// Escape `LIKE` metacharacters so user input matches literally.
pub fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

pub struct PgUserDirectory {
    pool: Pool,
}

impl PgUserDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &Row) -> User {
    User {
        id: row.get("id"),
        uuid: row.get("uuid"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

const USER_COLUMNS: &str = "id, uuid, username, password_hash, created_at";

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn create(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO users (uuid, username, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );

        match client
            .query_one(&sql, &[&Uuid::new_v4(), &username, &password_hash])
            .await
        {
            Ok(row) => Ok(row_to_user(&row)),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => Err(username_taken(username)),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = client.query_opt(&sql, &[&id]).await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = $1");
        let row = client.query_opt(&sql, &[&uuid]).await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = client.query_opt(&sql, &[&username]).await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_many(&self, ids: &[i64]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.pool.get().await?;
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            JOIN UNNEST($1::BIGINT[]) WITH ORDINALITY AS wanted(id, ord) USING (id)
            ORDER BY wanted.ord
            "#
        );
        let rows = client.query(&sql, &[&ids]).await?;
        Ok(rows.iter().map(row_to_user).collect())
    }

    async fn search(&self, prefix: &str, exclude_id: i64, limit: i64) -> AppResult<Vec<User>> {
        let client = self.pool.get().await?;
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE lower(username) LIKE lower($1) ESCAPE '\'
              AND id <> $2
            ORDER BY lower(username)
            LIMIT $3
            "#
        );
        let rows = client
            .query(&sql, &[&like_prefix(prefix), &exclude_id, &limit])
            .await?;
        Ok(rows.iter().map(row_to_user).collect())
    }
}
