use crate::error::{AppError, AppResult, AuthFailure};
use crate::models::User;
use crate::services::auth::IdentityProvider;
use crate::services::presence::PresenceBroadcaster;
use crate::services::user_directory::UserDirectory;
use crate::websocket::events::WsOutboundEvent;
use crate::websocket::registry::{ConnectionId, LiveConnection, PresenceRegistry};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Binds real-time connections to verified identities
pub struct SessionBinder {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserDirectory>,
    registry: PresenceRegistry,
    presence: PresenceBroadcaster,
}

impl SessionBinder {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserDirectory>,
        registry: PresenceRegistry,
        presence: PresenceBroadcaster,
    ) -> Self {
        Self {
            identity,
            users,
            registry,
            presence,
        }
    }

    /// Resolve the session token to a user. Touches no presence state.
    pub async fn authenticate(&self, session_token: Option<&str>) -> AppResult<User> {
        let user_id = self.identity.identify(session_token).await?;

        // A valid token for a user that no longer exists is treated as an invalid session.
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized(AuthFailure::InvalidSession))
    }

    /// Register `connection` for `user`, announce the user if this is their
    /// first connection, and queue the presence snapshot on it.
    pub async fn bind(&self, user: &User, connection: LiveConnection) {
        let id = connection.id();
        let snapshot_target = connection.clone();

        let went_online = self.registry.register(user.uuid, connection).await;
        tracing::info!(user = %user.uuid, connection = %id, went_online, "connection bound");

        if self.presence.enabled() {
            match self.presence.snapshot_for(user).await {
                Ok(online) => self.push_snapshot(&snapshot_target, online),
                Err(e) => tracing::warn!(user = %user.uuid, error = %e, "presence snapshot failed"),
            }
        }

        if went_online {
            self.presence.announce(user.uuid, true).await;
        }
    }

    fn push_snapshot(&self, connection: &LiveConnection, online: Vec<Uuid>) {
        match (WsOutboundEvent::PresenceSnapshot { online }).to_frame() {
            Ok(frame) => {
                if let Err(e) = connection.try_push(frame) {
                    tracing::debug!(connection = %connection.id(), error = %e, "snapshot not queued");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to encode presence-snapshot"),
        }
    }

    /// Unregister exactly this connection. Safe to call more than once.
    pub async fn release(&self, user: Uuid, connection: ConnectionId) {
        let connected_secs = self
            .registry
            .live_connections_for(user)
            .await
            .iter()
            .find(|c| c.id() == connection)
            .map(|c| (Utc::now() - c.connected_at()).num_seconds());

        let went_offline = self.registry.unregister(user, connection).await;
        tracing::info!(%user, connection = %connection, went_offline, connected_secs, "connection released");

        if went_offline {
            self.presence.announce(user, false).await;
        }
    }
}
