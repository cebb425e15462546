use crate::error::AppResult;
use crate::models::User;
use crate::services::contact_graph::ContactGraph;
use crate::services::delivery::DeliveryRouter;
use crate::services::user_directory::UserDirectory;
use crate::websocket::events::WsOutboundEvent;
use crate::websocket::registry::PresenceRegistry;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Tells contacts when a user comes online or goes offline
///
/// A user `X` sees `Y`'s presence only if `X` holds an edge `X -> Y`.
///
/// Transitions are decided under the registry lock but announced later, so a
/// quick disconnect/reconnect can race. Announcements are serialized and each
/// one re-reads the registry; watchers only hear a state that differs from the
/// last one they were told.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: PresenceRegistry,
    router: DeliveryRouter,
    contacts: ContactGraph,
    users: Arc<dyn UserDirectory>,
    enabled: bool,
    /// Users last announced online
    announced: Arc<Mutex<HashSet<Uuid>>>,
}

impl PresenceBroadcaster {
    pub fn new(
        registry: PresenceRegistry,
        router: DeliveryRouter,
        contacts: ContactGraph,
        users: Arc<dyn UserDirectory>,
        enabled: bool,
    ) -> Self {
        Self {
            registry,
            router,
            contacts,
            users,
            enabled,
            announced: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Online contacts `user` is entitled to see.
    pub async fn snapshot_for(&self, user: &User) -> AppResult<Vec<Uuid>> {
        let targets = self.contacts.watched_by(user.id).await?;
        let uuids: Vec<Uuid> = self
            .users
            .find_many(&targets)
            .await?
            .into_iter()
            .map(|u| u.uuid)
            .collect();
        Ok(self.registry.online_among(&uuids).await)
    }

    /// Announce a presence transition. Watchers dropped as stale while
    /// announcing are announced offline in turn. Failures are logged, never
    /// returned: presence is best effort.
    pub async fn announce(&self, user: Uuid, online: bool) {
        if !self.enabled {
            return;
        }

        let mut pending = VecDeque::from([(user, online)]);
        while let Some((user, online)) = pending.pop_front() {
            match self.announce_one(user, online).await {
                Ok(went_offline) => {
                    pending.extend(went_offline.into_iter().map(|u| (u, false)));
                }
                Err(e) => {
                    tracing::warn!(%user, online, error = %e, "presence broadcast failed");
                }
            }
        }
    }

    async fn announce_one(&self, user: Uuid, online: bool) -> AppResult<Vec<Uuid>> {
        let Some(subject) = self.users.find_by_uuid(user).await? else {
            return Ok(Vec::new());
        };

        let watcher_ids = self.contacts.watchers(subject.id).await?;
        let watchers = self.users.find_many(&watcher_ids).await?;

        let mut announced = self.announced.lock().await;
        let current = self.registry.is_online(user).await;
        let last = announced.contains(&user);
        if current != online || current == last {
            tracing::debug!(%user, online, current, "stale presence transition dropped");
            return Ok(Vec::new());
        }
        if current {
            announced.insert(user);
        } else {
            announced.remove(&user);
        }

        let frame = match (WsOutboundEvent::PresenceChanged {
            user_uuid: user,
            online,
        })
        .to_frame()
        {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode presence-changed");
                return Ok(Vec::new());
            }
        };

        let mut notified = 0;
        let mut went_offline = Vec::new();
        for watcher in watchers {
            let report = self.router.fan_out(watcher.uuid, &frame, None).await;
            notified += report.pushed;
            went_offline.extend(report.went_offline);
        }

        tracing::debug!(%user, online, notified, "presence announced");
        Ok(went_offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::{MemoryContactStore, MemoryUserDirectory};
    use crate::websocket::registry::LiveConnection;
    use tokio::sync::mpsc;

    struct Fixture {
        registry: PresenceRegistry,
        users: Arc<MemoryUserDirectory>,
        contacts: ContactGraph,
        presence: PresenceBroadcaster,
    }

    fn fixture(enabled: bool) -> Fixture {
        let registry = PresenceRegistry::new();
        let users = Arc::new(MemoryUserDirectory::new());
        let contacts = ContactGraph::new(Arc::new(MemoryContactStore::new()));
        let presence = PresenceBroadcaster::new(
            registry.clone(),
            DeliveryRouter::new(registry.clone()),
            contacts.clone(),
            users.clone(),
            enabled,
        );
        Fixture {
            registry,
            users,
            contacts,
            presence,
        }
    }

    async fn online(registry: &PresenceRegistry, user: &User) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(8);
        registry.register(user.uuid, LiveConnection::new(tx)).await;
        rx
    }

    #[tokio::test]
    async fn test_only_watchers_are_told() {
        let f = fixture(true);
        let alice = f.users.create("alice", "h").await.unwrap();
        let bob = f.users.create("bob", "h").await.unwrap();
        let carol = f.users.create("carol", "h").await.unwrap();

        // bob added alice; carol did not
        f.contacts.add_contact(bob.id, alice.id).await.unwrap();
        let mut bob_rx = online(&f.registry, &bob).await;
        let mut carol_rx = online(&f.registry, &carol).await;
        let _alice_rx = online(&f.registry, &alice).await;

        f.presence.announce(alice.uuid, true).await;

        let frame: serde_json::Value = serde_json::from_str(&bob_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "presence-changed");
        assert_eq!(frame["user_uuid"], alice.uuid.to_string());
        assert_eq!(frame["online"], true);
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disabled_is_silent() {
        let f = fixture(false);
        let alice = f.users.create("alice", "h").await.unwrap();
        let bob = f.users.create("bob", "h").await.unwrap();
        f.contacts.add_contact(bob.id, alice.id).await.unwrap();
        let mut bob_rx = online(&f.registry, &bob).await;

        f.presence.announce(alice.uuid, true).await;
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_snapshot_lists_online_targets() {
        let f = fixture(true);
        let alice = f.users.create("alice", "h").await.unwrap();
        let bob = f.users.create("bob", "h").await.unwrap();
        let carol = f.users.create("carol", "h").await.unwrap();
        let dave = f.users.create("dave", "h").await.unwrap();

        f.contacts.add_contact(alice.id, bob.id).await.unwrap();
        f.contacts.add_contact(alice.id, carol.id).await.unwrap();
        f.contacts.add_contact(dave.id, alice.id).await.unwrap();
        let _bob_rx = online(&f.registry, &bob).await;
        let _dave_rx = online(&f.registry, &dave).await;

        assert_eq!(f.presence.snapshot_for(&alice).await.unwrap(), vec![bob.uuid]);
    }

    #[tokio::test]
    async fn test_transition_not_matching_registry_is_dropped() {
        let f = fixture(true);
        let alice = f.users.create("alice", "h").await.unwrap();
        let bob = f.users.create("bob", "h").await.unwrap();
        f.contacts.add_contact(bob.id, alice.id).await.unwrap();
        let mut bob_rx = online(&f.registry, &bob).await;

        // alice never connected
        f.presence.announce(alice.uuid, true).await;
        assert!(bob_rx.try_recv().is_err());

        let _alice_rx = online(&f.registry, &alice).await;
        f.presence.announce(alice.uuid, false).await;
        assert!(bob_rx.try_recv().is_err());

        f.presence.announce(alice.uuid, true).await;
        f.presence.announce(alice.uuid, true).await;
        let frame: serde_json::Value = serde_json::from_str(&bob_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["online"], true);
        assert!(bob_rx.try_recv().is_err());
    }
}
