use crate::error::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use error_types::error_codes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted message. Immutable after insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Insertion sequence, tie-break for equal timestamps
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn cursor(&self) -> HistoryCursor {
        HistoryCursor {
            created_at: self.created_at,
            seq: self.id,
        }
    }
}

/// Message as it crosses the wire: user identities are uuids only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageView {
    pub seq: i64,
    pub sender_uuid: Uuid,
    pub recipient_uuid: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl MessageView {
    pub fn new(message: &Message, sender_uuid: Uuid, recipient_uuid: Uuid) -> Self {
        Self {
            seq: message.id,
            sender_uuid,
            recipient_uuid,
            text: message.body.clone(),
            created_at: message.created_at,
        }
    }
}

/// Keyset position `(created_at, seq)` in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCursor {
    pub created_at: DateTime<Utc>,
    pub seq: i64,
}

impl HistoryCursor {
    /// Opaque token handed to clients
    pub fn encode(&self) -> String {
        let raw = format!("{}.{}", self.created_at.timestamp_micros(), self.seq);
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    pub fn decode(token: &str) -> AppResult<Self> {
        let invalid = || AppError::validation(error_codes::INVALID_REQUEST, "invalid history cursor");

        let bytes = URL_SAFE_NO_PAD.decode(token.trim()).map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (micros, seq) = raw.split_once('.').ok_or_else(invalid)?;
        let micros: i64 = micros.parse().map_err(|_| invalid())?;
        let seq: i64 = seq.parse().map_err(|_| invalid())?;
        let created_at = DateTime::from_timestamp_micros(micros).ok_or_else(invalid)?;

        Ok(Self { created_at, seq })
    }

    /// Strict `(created_at, seq)` ordering, same as the SQL row comparison.
    pub fn is_before(&self, message: &Message) -> bool {
        (self.created_at, self.seq) < (message.created_at, message.id)
    }

    pub fn is_after(&self, message: &Message) -> bool {
        (self.created_at, self.seq) > (message.created_at, message.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryDirection {
    /// Older than the cursor; without a cursor, the newest page
    #[default]
    Backward,
    /// Newer than the cursor; without a cursor, the oldest page
    Forward,
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryQuery {
    pub cursor: Option<HistoryCursor>,
    pub direction: HistoryDirection,
    pub limit: i64,
}

impl HistoryQuery {
    pub fn latest(limit: i64) -> Self {
        Self {
            cursor: None,
            direction: HistoryDirection::Backward,
            limit,
        }
    }
}

/// One page of a conversation, ascending by `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    /// Cursor continuing in the requested direction, set when `has_more`
    pub next_cursor: Option<HistoryCursor>,
    pub has_more: bool,
}

impl HistoryPage {
    /// Build a page from up to `limit + 1` rows in scan order
    /// (descending for backward, ascending for forward).
    pub fn from_probe(mut rows: Vec<Message>, query: &HistoryQuery) -> Self {
        let limit = query.limit.max(0) as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        if query.direction == HistoryDirection::Backward {
            rows.reverse();
        }

        let next_cursor = if has_more {
            match query.direction {
                HistoryDirection::Backward => rows.first().map(Message::cursor),
                HistoryDirection::Forward => rows.last().map(Message::cursor),
            }
        } else {
            None
        };

        Self {
            messages: rows,
            next_cursor,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn msg(id: i64, secs: i64) -> Message {
        Message {
            id,
            sender_id: 1,
            recipient_id: 2,
            body: format!("m{id}"),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_cursor_token_is_opaque_and_restartable() {
        let cursor = msg(42, 7).cursor();
        let token = cursor.encode();

        assert!(!token.contains('.'));
        assert_eq!(HistoryCursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(HistoryCursor::decode("!!!").is_err());
        assert!(HistoryCursor::decode(&URL_SAFE_NO_PAD.encode("abc")).is_err());
        assert!(HistoryCursor::decode(&URL_SAFE_NO_PAD.encode("1.x")).is_err());
    }

    #[test]
    fn test_cursor_orders_on_seq_for_equal_timestamps() {
        let a = msg(1, 0);
        let b = msg(2, 0);
        assert!(a.cursor().is_before(&b));
        assert!(b.cursor().is_after(&a));
    }

    #[test]
    fn test_backward_page_is_ascending() {
        let rows = vec![msg(5, 5), msg(4, 4), msg(3, 3)];
        let page = HistoryPage::from_probe(rows, &HistoryQuery::latest(2));

        assert!(page.has_more);
        assert_eq!(page.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(page.next_cursor, Some(msg(4, 4).cursor()));
    }

    #[test]
    fn test_forward_page_without_more() {
        let query = HistoryQuery {
            cursor: None,
            direction: HistoryDirection::Forward,
            limit: 5,
        };
        let page = HistoryPage::from_probe(vec![msg(1, 1), msg(2, 2)], &query);

        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
        assert_eq!(page.messages.len(), 2);
    }
}
