use crate::error::{AppError, AppResult};
use crate::models::{HistoryDirection, HistoryPage, HistoryQuery, Message};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use error_types::error_codes;
use tokio_postgres::Row;

/// System of record for messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append a message. Returns only after commit.
    async fn persist(&self, sender_id: i64, recipient_id: i64, text: &str) -> AppResult<Message>;

    /// Conversation between `a` and `b` regardless of direction, paged by keyset.
    async fn history(&self, a: i64, b: i64, query: &HistoryQuery) -> AppResult<HistoryPage>;
}

/// Store-level guard: whitespace-only bodies never reach storage.
pub fn ensure_body(text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::validation(
            error_codes::MESSAGE_EMPTY,
            "message text must not be empty",
        ));
    }
    Ok(())
}

pub struct PgMessageStore {
    pool: Pool,
}

impl PgMessageStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &Row) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}

const HISTORY_BACKWARD: &str = r#"
    SELECT id, sender_id, recipient_id, body, created_at
    FROM messages
    WHERE LEAST(sender_id, recipient_id) = LEAST($1::BIGINT, $2::BIGINT)
      AND GREATEST(sender_id, recipient_id) = GREATEST($1::BIGINT, $2::BIGINT)
      AND ($3::TIMESTAMPTZ IS NULL OR (created_at, id) < ($3::TIMESTAMPTZ, $4::BIGINT))
    ORDER BY created_at DESC, id DESC
    LIMIT $5
"#;

const HISTORY_FORWARD: &str = r#"
    SELECT id, sender_id, recipient_id, body, created_at
    FROM messages
    WHERE LEAST(sender_id, recipient_id) = LEAST($1::BIGINT, $2::BIGINT)
      AND GREATEST(sender_id, recipient_id) = GREATEST($1::BIGINT, $2::BIGINT)
      AND ($3::TIMESTAMPTZ IS NULL OR (created_at, id) > ($3::TIMESTAMPTZ, $4::BIGINT))
    ORDER BY created_at ASC, id ASC
    LIMIT $5
"#;

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn persist(&self, sender_id: i64, recipient_id: i64, text: &str) -> AppResult<Message> {
        ensure_body(text)?;

        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO messages (sender_id, recipient_id, body)
                VALUES ($1, $2, $3)
                RETURNING id, sender_id, recipient_id, body, created_at
                "#,
                &[&sender_id, &recipient_id, &text],
            )
            .await?;

        Ok(row_to_message(&row))
    }

    async fn history(&self, a: i64, b: i64, query: &HistoryQuery) -> AppResult<HistoryPage> {
        let client = self.pool.get().await?;

        let cursor_ts = query.cursor.map(|c| c.created_at);
        let cursor_seq = query.cursor.map(|c| c.seq).unwrap_or(0);
        let probe = query.limit.max(0) + 1;

        let sql = match query.direction {
            HistoryDirection::Backward => HISTORY_BACKWARD,
            HistoryDirection::Forward => HISTORY_FORWARD,
        };

        let rows = client
            .query(sql, &[&a, &b, &cursor_ts, &cursor_seq, &probe])
            .await?;

        let messages = rows.iter().map(row_to_message).collect();
        Ok(HistoryPage::from_probe(messages, query))
    }
}
