use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{
    mpsc::{error::TrySendError, Sender},
    RwLock,
};
use uuid::Uuid;

/// Unique handle for one live connection
///
/// Minted when the socket is accepted; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A push that could not be queued. The connection is treated as stale.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    #[error("outbound queue full")]
    Backpressured,

    #[error("connection closed")]
    Closed,
}

/// Presence entry: one open real-time connection
#[derive(Debug, Clone)]
pub struct LiveConnection {
    id: ConnectionId,
    connected_at: DateTime<Utc>,
    sender: Sender<String>,
}

impl LiveConnection {
    pub fn new(sender: Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            connected_at: Utc::now(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a frame without waiting. A slow client is never awaited.
    pub fn try_push(&self, payload: String) -> Result<(), PushError> {
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Backpressured,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }
}

#[derive(Default)]
struct PresenceState {
    by_user: HashMap<Uuid, Vec<LiveConnection>>,
    /// Reverse index; a handle belongs to exactly one user
    owners: HashMap<ConnectionId, Uuid>,
}

/// Process-local map from user uuid to that user's live connections
///
/// Every mutation happens under one write lock, so readers never observe a
/// half-registered connection. Dropping an entry drops the registry's sender,
/// which ends the connection's outbound stream once it drains.
#[derive(Default, Clone)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<PresenceState>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to `user`'s live set.
    ///
    /// Returns `true` when this was the user's first connection (offline -> online).
    /// Registering a handle that is already present for the same user is a no-op.
    pub async fn register(&self, user: Uuid, connection: LiveConnection) -> bool {
        let mut guard = self.inner.write().await;
        let id = connection.id();

        match guard.owners.get(&id).copied() {
            Some(owner) if owner == user => {
                tracing::debug!(%user, connection = %id, "connection already registered");
                return false;
            }
            Some(previous) => {
                tracing::warn!(%user, %previous, connection = %id, "connection moved between users");
                if let Some(conns) = guard.by_user.get_mut(&previous) {
                    conns.retain(|c| c.id() != id);
                    if conns.is_empty() {
                        guard.by_user.remove(&previous);
                    }
                }
            }
            None => {}
        }

        guard.owners.insert(id, user);
        let conns = guard.by_user.entry(user).or_default();
        conns.push(connection);
        let went_online = conns.len() == 1;

        tracing::debug!(%user, connection = %id, live = conns.len(), "connection registered");
        went_online
    }

    /// Remove exactly one connection. Unknown handles are ignored.
    ///
    /// Returns `true` when it was the user's last connection (online -> offline).
    pub async fn unregister(&self, user: Uuid, id: ConnectionId) -> bool {
        let mut guard = self.inner.write().await;

        if guard.owners.get(&id) != Some(&user) {
            return false;
        }
        guard.owners.remove(&id);

        let Some(conns) = guard.by_user.get_mut(&user) else {
            return false;
        };
        conns.retain(|c| c.id() != id);
        let remaining = conns.len();

        tracing::debug!(%user, connection = %id, remaining, "connection unregistered");

        if remaining == 0 {
            guard.by_user.remove(&user);
            true
        } else {
            false
        }
    }

    /// Snapshot of `user`'s live connections; empty when offline.
    pub async fn live_connections_for(&self, user: Uuid) -> Vec<LiveConnection> {
        let guard = self.inner.read().await;
        guard.by_user.get(&user).cloned().unwrap_or_default()
    }

    pub async fn is_online(&self, user: Uuid) -> bool {
        let guard = self.inner.read().await;
        guard.by_user.get(&user).is_some_and(|c| !c.is_empty())
    }

    /// The subset of `users` currently online, in input order.
    pub async fn online_among(&self, users: &[Uuid]) -> Vec<Uuid> {
        let guard = self.inner.read().await;
        users
            .iter()
            .filter(|u| guard.by_user.contains_key(u))
            .copied()
            .collect()
    }

    pub async fn online_user_count(&self) -> usize {
        self.inner.read().await.by_user.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.owners.len()
    }
}
