use crate::models::MessageView;
use crate::websocket::events::WsOutboundEvent;
use crate::websocket::registry::{ConnectionId, PresenceRegistry};
use std::collections::HashSet;
use uuid::Uuid;

/// Outcome of routing one message or event
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipient connections that accepted the frame
    pub pushed: usize,
    /// Sender connections (other than the origin) that accepted the echo
    pub echoed: usize,
    /// Connections dropped as stale during this delivery
    pub stale: Vec<(Uuid, ConnectionId)>,
    /// Users whose last connection was dropped as stale
    pub went_offline: Vec<Uuid>,
}

impl DeliveryReport {
    fn absorb(&mut self, other: FanOut) {
        self.stale.extend(other.stale);
        self.went_offline.extend(other.went_offline);
    }
}

#[derive(Debug, Default)]
struct FanOut {
    pushed: usize,
    stale: Vec<(Uuid, ConnectionId)>,
    went_offline: Vec<Uuid>,
}

/// Pushes persisted messages to live connections
///
/// Always called after the message store committed. Pushes never wait: a
/// connection that cannot take the frame right now is unregistered and the
/// remaining fan-out continues.
#[derive(Clone)]
pub struct DeliveryRouter {
    registry: PresenceRegistry,
}

impl DeliveryRouter {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    /// Deliver `message` to every recipient connection, then echo it to the
    /// sender's other connections. `origin` (the submitting connection) gets no
    /// echo; it is acknowledged separately. Each connection sees the message once.
    pub async fn route(&self, message: &MessageView, origin: Option<ConnectionId>) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let frame = match WsOutboundEvent::NewMessage(message.clone()).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, seq = message.seq, "failed to encode new-message");
                return report;
            }
        };

        let mut delivered = HashSet::new();

        let to_recipient = self
            .fan_out_inner(message.recipient_uuid, &frame, None, &mut delivered)
            .await;
        report.pushed = to_recipient.pushed;
        report.absorb(to_recipient);

        let echo = self
            .fan_out_inner(message.sender_uuid, &frame, origin, &mut delivered)
            .await;
        report.echoed = echo.pushed;
        report.absorb(echo);

        if report.pushed == 0 {
            tracing::debug!(
                seq = message.seq,
                recipient = %message.recipient_uuid,
                "recipient offline, message left for next fetch"
            );
        }

        report
    }

    /// Push an already-encoded frame to all of `user`'s connections except `exclude`.
    pub async fn fan_out(&self, user: Uuid, frame: &str, exclude: Option<ConnectionId>) -> DeliveryReport {
        let mut delivered = HashSet::new();
        let out = self.fan_out_inner(user, frame, exclude, &mut delivered).await;

        let mut report = DeliveryReport {
            pushed: out.pushed,
            ..DeliveryReport::default()
        };
        report.absorb(out);
        report
    }

    async fn fan_out_inner(
        &self,
        user: Uuid,
        frame: &str,
        exclude: Option<ConnectionId>,
        delivered: &mut HashSet<ConnectionId>,
    ) -> FanOut {
        let mut out = FanOut::default();

        for connection in self.registry.live_connections_for(user).await {
            let id = connection.id();
            if Some(id) == exclude || !delivered.insert(id) {
                continue;
            }

            match connection.try_push(frame.to_string()) {
                Ok(()) => out.pushed += 1,
                Err(e) => {
                    tracing::warn!(%user, connection = %id, error = %e, "dropping stale connection");
                    out.stale.push((user, id));
                }
            }
        }

        for (user, id) in &out.stale {
            if self.registry.unregister(*user, *id).await {
                out.went_offline.push(*user);
            }
        }

        out
    }
}
