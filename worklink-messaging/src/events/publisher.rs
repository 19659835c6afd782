use uuid::Uuid;

use worklink_shared::clients::rabbitmq::RabbitMqClient;
use worklink_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{Conversation, Message};

/// Fire-and-forget: a failed publish is logged, never surfaced to the
/// sender whose message already committed.
pub async fn publish_message_sent(rabbitmq: &RabbitMqClient, message: &Message) {
    let content_preview: String = message.content.chars().take(100).collect();

    let event = Event::new(
        "worklink-messaging",
        routing_keys::MESSAGING_MESSAGE_SENT,
        payloads::MessageSent {
            message_id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content_preview,
        },
    )
    .with_user(message.sender_id);

    if let Err(e) = rabbitmq.publish(routing_keys::MESSAGING_MESSAGE_SENT, &event).await {
        tracing::error!(error = %e, "failed to publish message.sent event");
    }
}

pub async fn publish_conversation_created(
    rabbitmq: &RabbitMqClient,
    conversation: &Conversation,
    created_by: Uuid,
) {
    let event = Event::new(
        "worklink-messaging",
        routing_keys::MESSAGING_CONVERSATION_CREATED,
        payloads::ConversationCreated {
            conversation_id: conversation.id,
            created_by,
            is_group: conversation.is_group,
        },
    )
    .with_user(created_by);

    if let Err(e) = rabbitmq
        .publish(routing_keys::MESSAGING_CONVERSATION_CREATED, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish conversation.created event");
    }
}
