use crate::{
    config::Config,
    services::{
        contact_store::{ContactStore, PgContactStore},
        memory::{MemoryContactStore, MemoryMessageStore, MemoryUserDirectory},
        message_store::{MessageStore, PgMessageStore},
        user_directory::{PgUserDirectory, UserDirectory},
        AuthService, ChatService, ContactGraph, DeliveryRouter, PresenceBroadcaster, SessionTokens,
    },
    websocket::{PresenceRegistry, SessionBinder},
};
use deadpool_postgres::Pool;
use std::sync::Arc;

/// Storage backends behind the service traits
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserDirectory>,
    pub contacts: Arc<dyn ContactStore>,
    pub messages: Arc<dyn MessageStore>,
}

impl Stores {
    pub fn postgres(pool: Pool) -> Self {
        Self {
            users: Arc::new(PgUserDirectory::new(pool.clone())),
            contacts: Arc::new(PgContactStore::new(pool.clone())),
            messages: Arc::new(PgMessageStore::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryUserDirectory::new()),
            contacts: Arc::new(MemoryContactStore::new()),
            messages: Arc::new(MemoryMessageStore::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserDirectory>,
    pub contacts: ContactGraph,
    /// Live connections for this process
    pub registry: PresenceRegistry,
    pub tokens: Arc<SessionTokens>,
    pub auth: Arc<AuthService>,
    pub chat: Arc<ChatService>,
    pub binder: Arc<SessionBinder>,
}

impl AppState {
    pub fn new(config: Arc<Config>, stores: Stores) -> Self {
        let registry = PresenceRegistry::new();
        let router = DeliveryRouter::new(registry.clone());
        let contacts = ContactGraph::new(stores.contacts);
        let tokens = Arc::new(SessionTokens::new(
            &config.session.secret,
            chrono::Duration::hours(config.session.ttl_hours),
        ));

        let presence = PresenceBroadcaster::new(
            registry.clone(),
            router.clone(),
            contacts.clone(),
            stores.users.clone(),
            config.presence_broadcast,
        );

        let auth = Arc::new(AuthService::new(stores.users.clone(), tokens.clone()));
        let chat = Arc::new(ChatService::new(
            stores.users.clone(),
            stores.messages,
            router,
            presence.clone(),
            config.max_message_length,
        ));
        let binder = Arc::new(SessionBinder::new(
            tokens.clone(),
            stores.users.clone(),
            registry.clone(),
            presence,
        ));

        Self {
            config,
            users: stores.users,
            contacts,
            registry,
            tokens,
            auth,
            chat,
            binder,
        }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(config), Stores::in_memory())
    }
}
