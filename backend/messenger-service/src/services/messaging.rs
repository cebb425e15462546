use crate::error::{AppError, AppResult};
use crate::models::{HistoryQuery, MessageView, User};
use crate::services::delivery::DeliveryRouter;
use crate::services::message_store::MessageStore;
use crate::services::presence::PresenceBroadcaster;
use crate::services::user_directory::UserDirectory;
use crate::websocket::registry::ConnectionId;
use error_types::error_codes;
use std::sync::Arc;
use uuid::Uuid;

/// A history page converted for the wire
#[derive(Debug, Clone)]
pub struct HistoryView {
    pub messages: Vec<MessageView>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Send path: validate, persist, then route.
pub struct ChatService {
    users: Arc<dyn UserDirectory>,
    store: Arc<dyn MessageStore>,
    router: DeliveryRouter,
    presence: PresenceBroadcaster,
    max_message_length: usize,
}

impl ChatService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn MessageStore>,
        router: DeliveryRouter,
        presence: PresenceBroadcaster,
        max_message_length: usize,
    ) -> Self {
        Self {
            users,
            store,
            router,
            presence,
            max_message_length,
        }
    }

    fn validate_text(&self, text: &str) -> AppResult<()> {
        if text.trim().is_empty() {
            return Err(AppError::validation(
                error_codes::MESSAGE_EMPTY,
                "message text must not be empty",
            ));
        }
        if text.chars().count() > self.max_message_length {
            return Err(AppError::validation(
                error_codes::MESSAGE_TOO_LONG,
                format!("message text exceeds {} characters", self.max_message_length),
            ));
        }
        Ok(())
    }

    /// Resolve a wire identifier; malformed and unknown ids are both
    /// validation errors for the sender.
    pub async fn resolve_recipient(&self, recipient_uuid: &str) -> AppResult<User> {
        let uuid = Uuid::parse_str(recipient_uuid.trim()).map_err(|_| {
            AppError::validation(error_codes::RECIPIENT_INVALID, "recipient_uuid is not a valid id")
        })?;

        self.users.find_by_uuid(uuid).await?.ok_or_else(|| {
            AppError::validation(error_codes::RECIPIENT_INVALID, "recipient does not exist")
        })
    }

    /// Persist a message and push it to live connections.
    ///
    /// Nothing is pushed unless the insert committed. `origin` is the
    /// submitting connection, excluded from the sender echo.
    pub async fn send(
        &self,
        sender: &User,
        recipient_uuid: &str,
        text: &str,
        origin: Option<ConnectionId>,
    ) -> AppResult<MessageView> {
        self.validate_text(text)?;
        let recipient = self.resolve_recipient(recipient_uuid).await?;

        let message = self.store.persist(sender.id, recipient.id, text).await?;
        let view = MessageView::new(&message, sender.uuid, recipient.uuid);

        let report = self.router.route(&view, origin).await;
        tracing::info!(
            seq = view.seq,
            sender = %sender.uuid,
            recipient = %recipient.uuid,
            pushed = report.pushed,
            echoed = report.echoed,
            stale = report.stale.len(),
            "message sent"
        );

        for user in report.went_offline {
            self.presence.announce(user, false).await;
        }

        Ok(view)
    }

    /// Conversation between `viewer` and `other_uuid`.
    pub async fn history(&self, viewer: &User, other_uuid: Uuid, query: &HistoryQuery) -> AppResult<HistoryView> {
        let other = self
            .users
            .find_by_uuid(other_uuid)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".into()))?;

        let page = self.store.history(viewer.id, other.id, query).await?;

        let uuid_of = |id: i64| if id == viewer.id { viewer.uuid } else { other.uuid };
        let messages = page
            .messages
            .iter()
            .map(|m| MessageView::new(m, uuid_of(m.sender_id), uuid_of(m.recipient_id)))
            .collect();

        Ok(HistoryView {
            messages,
            next_cursor: page.next_cursor.map(|c| c.encode()),
            has_more: page.has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryPage, Message};
    use crate::services::contact_graph::ContactGraph;
    use crate::services::memory::{MemoryContactStore, MemoryMessageStore, MemoryUserDirectory};
    use crate::websocket::registry::{LiveConnection, PresenceRegistry};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    /// A store whose commit never succeeds
    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn persist(&self, _sender_id: i64, _recipient_id: i64, _text: &str) -> AppResult<Message> {
            Err(AppError::Storage("connection reset".into()))
        }

        async fn history(&self, _a: i64, _b: i64, _query: &HistoryQuery) -> AppResult<HistoryPage> {
            Err(AppError::Storage("connection reset".into()))
        }
    }

    fn service(store: Arc<dyn MessageStore>) -> (ChatService, Arc<MemoryUserDirectory>, PresenceRegistry) {
        let registry = PresenceRegistry::new();
        let users = Arc::new(MemoryUserDirectory::new());
        let router = DeliveryRouter::new(registry.clone());
        let presence = PresenceBroadcaster::new(
            registry.clone(),
            router.clone(),
            ContactGraph::new(Arc::new(MemoryContactStore::new())),
            users.clone(),
            true,
        );
        let chat = ChatService::new(users.clone(), store, router, presence, 16);
        (chat, users, registry)
    }

    #[tokio::test]
    async fn test_failed_commit_pushes_nothing_and_is_retryable() {
        let (chat, users, registry) = service(Arc::new(FailingStore));
        let alice = users.create("alice", "h").await.unwrap();
        let bob = users.create("bob", "h").await.unwrap();
        let (tx, mut bob_rx) = mpsc::channel(8);
        registry.register(bob.uuid, LiveConnection::new(tx)).await;

        let err = chat.send(&alice, &bob.uuid.to_string(), "hi", None).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.code(), error_codes::STORAGE_UNAVAILABLE);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejected_text_never_reaches_store() {
        let (chat, users, registry) = service(Arc::new(MemoryMessageStore::new()));
        let alice = users.create("alice", "h").await.unwrap();
        let bob = users.create("bob", "h").await.unwrap();
        let (tx, mut bob_rx) = mpsc::channel(8);
        registry.register(bob.uuid, LiveConnection::new(tx)).await;

        let err = chat.send(&alice, &bob.uuid.to_string(), "   ", None).await.unwrap_err();
        assert_eq!(err.code(), error_codes::MESSAGE_EMPTY);
        let err = chat
            .send(&alice, &bob.uuid.to_string(), &"x".repeat(17), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), error_codes::MESSAGE_TOO_LONG);
        let err = chat.send(&alice, "not-a-uuid", "hi", None).await.unwrap_err();
        assert_eq!(err.code(), error_codes::RECIPIENT_INVALID);

        assert!(bob_rx.try_recv().is_err());
        let page = chat.history(&bob, alice.uuid, &HistoryQuery::latest(50)).await.unwrap();
        assert!(page.messages.is_empty());
    }
}
