use crate::models::MessageView;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound WebSocket frames (client -> server)
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    /// `recipient_uuid` stays a string so a malformed id is reported
    /// as a validation error instead of an unparseable frame.
    #[serde(rename = "send-message")]
    SendMessage {
        recipient_uuid: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },
}

/// Outbound WebSocket frames (server -> client)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    #[serde(rename = "new-message")]
    NewMessage(MessageView),

    /// Sent only to the connection that submitted the message
    #[serde(rename = "send-ack")]
    SendAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
        message: MessageView,
    },

    #[serde(rename = "error")]
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },

    #[serde(rename = "presence-changed")]
    PresenceChanged { user_uuid: Uuid, online: bool },

    /// Online contacts at the moment the connection was bound
    #[serde(rename = "presence-snapshot")]
    PresenceSnapshot { online: Vec<Uuid> },
}

impl WsOutboundEvent {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_send_message() {
        let raw = r#"{"type":"send-message","recipient_uuid":"not-a-uuid","text":"hi"}"#;
        let evt: WsInboundEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            evt,
            WsInboundEvent::SendMessage {
                recipient_uuid: "not-a-uuid".into(),
                text: "hi".into(),
                client_ref: None,
            }
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<WsInboundEvent>(r#"{"type":"typing"}"#).is_err());
    }

    #[test]
    fn test_new_message_frame_is_flat() {
        let view = MessageView {
            seq: 7,
            sender_uuid: Uuid::new_v4(),
            recipient_uuid: Uuid::new_v4(),
            text: "hi".into(),
            created_at: Utc::now(),
        };
        let frame = WsOutboundEvent::NewMessage(view.clone()).to_frame().unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(json["type"], "new-message");
        assert_eq!(json["seq"], 7);
        assert_eq!(json["text"], "hi");
        assert_eq!(json["sender_uuid"], view.sender_uuid.to_string());
        assert!(json.get("sender_id").is_none());
    }

    #[test]
    fn test_presence_changed_frame() {
        let user = Uuid::new_v4();
        let frame = WsOutboundEvent::PresenceChanged {
            user_uuid: user,
            online: false,
        }
        .to_frame()
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "presence-changed");
        assert_eq!(json["online"], false);
    }
}
