use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use worklink_shared::types::event::{payloads, routing_keys, Event};

use crate::services::conversations::{self, CreateConversation};
use crate::AppState;

/// Listen for connection.accepted events and pre-create the direct
/// conversation between the two members, through the same dedupe path as a
/// user-initiated create.
pub async fn listen_connection_accepted(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state
        .rabbitmq
        .subscribe(
            "worklink-messaging.connection.accepted",
            &[routing_keys::CONNECTIONS_CONNECTION_ACCEPTED],
        )
        .await?;

    tracing::info!("listening for connection.accepted events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::ConnectionAccepted>>(&delivery.data) {
                    Ok(event) => {
                        let data = &event.data;
                        if let Err(e) = open_direct_conversation(&state, data) {
                            tracing::error!(
                                error = %e,
                                requester_id = %data.requester_id,
                                recipient_id = %data.recipient_id,
                                "failed to open conversation for accepted connection"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize connection.accepted event");
                    }
                }
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

fn open_direct_conversation(
    state: &Arc<AppState>,
    data: &payloads::ConnectionAccepted,
) -> anyhow::Result<()> {
    let mut conn = state.db.get()?;

    let result = conversations::create_conversation(
        &mut conn,
        data.requester_id,
        &CreateConversation {
            participant_ids: vec![data.recipient_id],
            is_group: false,
            title: None,
        },
    )?;

    if result.created {
        tracing::info!(
            conversation_id = %result.conversation.id,
            requester_id = %data.requester_id,
            recipient_id = %data.recipient_id,
            "opened direct conversation for accepted connection"
        );
    } else {
        tracing::debug!(
            conversation_id = %result.conversation.id,
            "direct conversation already exists, skipping"
        );
    }

    Ok(())
}
