use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event envelope wrapping all domain events on the bus.
///
/// Routing key format: `worklink.{domain}.{entity}.{action}`
/// Example: `worklink.messaging.message.sent`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Routing keys published or consumed by Worklink services.
pub mod routing_keys {
    // Connection events (connections service)
    pub const CONNECTIONS_CONNECTION_ACCEPTED: &str = "worklink.connections.connection.accepted";

    // Messaging events
    pub const MESSAGING_CONVERSATION_CREATED: &str = "worklink.messaging.conversation.created";
    pub const MESSAGING_MESSAGE_SENT: &str = "worklink.messaging.message.sent";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ConnectionAccepted {
        pub requester_id: Uuid,
        pub recipient_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ConversationCreated {
        pub conversation_id: Uuid,
        pub created_by: Uuid,
        pub is_group: bool,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MessageSent {
        pub message_id: Uuid,
        pub conversation_id: Uuid,
        pub sender_id: Uuid,
        pub content_preview: String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_source_and_type() {
        let event = Event::new(
            "worklink-messaging",
            routing_keys::MESSAGING_MESSAGE_SENT,
            payloads::MessageSent {
                message_id: Uuid::new_v4(),
                conversation_id: Uuid::new_v4(),
                sender_id: Uuid::new_v4(),
                content_preview: "hello".into(),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"], "worklink-messaging");
        assert_eq!(json["event_type"], "worklink.messaging.message.sent");
        assert_eq!(json["data"]["content_preview"], "hello");
    }

    #[test]
    fn with_user_stamps_the_actor() {
        let sender = Uuid::new_v4();
        let event = Event::new("worklink-messaging", "test", serde_json::json!({})).with_user(sender);
        assert_eq!(event.user_id, Some(sender));
    }

    #[test]
    fn connection_accepted_round_trip() {
        let payload = payloads::ConnectionAccepted {
            requester_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: payloads::ConnectionAccepted = serde_json::from_str(&json).unwrap();
        assert_eq!(back.requester_id, payload.requester_id);
    }
}
