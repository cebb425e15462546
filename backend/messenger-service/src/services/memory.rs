//! In-memory stores used by tests and by the service when `DATABASE_URL` is unset.
//! Contents are lost on restart.

use crate::error::AppResult;
use crate::models::{HistoryDirection, HistoryPage, HistoryQuery, Message, User};
use crate::services::contact_store::ContactStore;
use crate::services::message_store::{ensure_body, MessageStore};
use crate::services::user_directory::{username_taken, UserDirectory};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default, Clone)]
pub struct MemoryUserDirectory {
    inner: Arc<RwLock<Vec<User>>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let mut users = self.inner.write().await;
        if users.iter().any(|u| u.username == username) {
            return Err(username_taken(username));
        }

        let user = User {
            id: users.len() as i64 + 1,
            uuid: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let users = self.inner.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>> {
        let users = self.inner.read().await;
        Ok(users.iter().find(|u| u.uuid == uuid).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let users = self.inner.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_many(&self, ids: &[i64]) -> AppResult<Vec<User>> {
        let users = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| users.iter().find(|u| u.id == *id).cloned())
            .collect())
    }

    async fn search(&self, prefix: &str, exclude_id: i64, limit: i64) -> AppResult<Vec<User>> {
        let prefix = prefix.to_lowercase();
        let users = self.inner.read().await;

        let mut found: Vec<User> = users
            .iter()
            .filter(|u| u.id != exclude_id && u.username.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        found.sort_by_key(|u| u.username.to_lowercase());
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }
}

#[derive(Default)]
struct EdgeSet {
    /// Insertion order doubles as `created_at` order
    edges: Vec<(i64, i64)>,
}

#[derive(Default, Clone)]
pub struct MemoryContactStore {
    inner: Arc<RwLock<EdgeSet>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn insert_edge(&self, owner_id: i64, target_id: i64) -> AppResult<bool> {
        let mut set = self.inner.write().await;
        if set.edges.contains(&(owner_id, target_id)) {
            return Ok(false);
        }
        set.edges.push((owner_id, target_id));
        Ok(true)
    }

    async fn delete_edge(&self, owner_id: i64, target_id: i64) -> AppResult<bool> {
        let mut set = self.inner.write().await;
        let before = set.edges.len();
        set.edges.retain(|e| *e != (owner_id, target_id));
        Ok(set.edges.len() != before)
    }

    async fn edges_between(&self, a: i64, b: i64) -> AppResult<(bool, bool)> {
        let set = self.inner.read().await;
        Ok((set.edges.contains(&(a, b)), set.edges.contains(&(b, a))))
    }

    async fn targets_of(&self, owner_id: i64) -> AppResult<Vec<i64>> {
        let set = self.inner.read().await;
        Ok(set
            .edges
            .iter()
            .filter(|(owner, _)| *owner == owner_id)
            .map(|(_, target)| *target)
            .collect())
    }

    async fn owners_of(&self, target_id: i64) -> AppResult<Vec<i64>> {
        let set = self.inner.read().await;
        Ok(set
            .edges
            .iter()
            .filter(|(_, target)| *target == target_id)
            .map(|(owner, _)| *owner)
            .collect())
    }
}

#[derive(Default)]
struct MessageLog {
    messages: Vec<Message>,
    last_created_at: Option<DateTime<Utc>>,
}

#[derive(Default, Clone)]
pub struct MemoryMessageStore {
    inner: Arc<RwLock<MessageLog>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn persist(&self, sender_id: i64, recipient_id: i64, text: &str) -> AppResult<Message> {
        ensure_body(text)?;

        let mut log = self.inner.write().await;
        // Postgres TIMESTAMPTZ precision, so cursors round-trip exactly.
        // Wall clock may step backwards; the log never does.
        let now = Utc::now().trunc_subsecs(6);
        let created_at = match log.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };

        let message = Message {
            id: log.messages.len() as i64 + 1,
            sender_id,
            recipient_id,
            body: text.to_string(),
            created_at,
        };
        log.last_created_at = Some(created_at);
        log.messages.push(message.clone());
        Ok(message)
    }

    async fn history(&self, a: i64, b: i64, query: &HistoryQuery) -> AppResult<HistoryPage> {
        let log = self.inner.read().await;

        let in_pair = |m: &&Message| {
            (m.sender_id == a && m.recipient_id == b) || (m.sender_id == b && m.recipient_id == a)
        };
        let probe = query.limit.max(0) as usize + 1;

        // The log is already ascending by (created_at, id).
        let rows: Vec<Message> = match query.direction {
            HistoryDirection::Backward => log
                .messages
                .iter()
                .rev()
                .filter(in_pair)
                .filter(|m| query.cursor.map_or(true, |c| c.is_after(m)))
                .take(probe)
                .cloned()
                .collect(),
            HistoryDirection::Forward => log
                .messages
                .iter()
                .filter(in_pair)
                .filter(|m| query.cursor.map_or(true, |c| c.is_before(m)))
                .take(probe)
                .cloned()
                .collect(),
        };

        Ok(HistoryPage::from_probe(rows, query))
    }
}
