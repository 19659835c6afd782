use socketioxide::SocketIo;
use uuid::Uuid;

use crate::models::Message;

/// Event name for new-message fan-out.
pub const NEW_MESSAGE_EVENT: &str = "new_message";

/// Room naming: one room per conversation, joined only after the
/// membership check.
pub fn conversation_room(conversation_id: Uuid) -> String {
    format!("conversation:{conversation_id}")
}

/// Best-effort fan-out of a freshly stored message to the conversation's
/// live subscribers. At-most-once: nothing is queued or retried for
/// listeners that are not in the room right now; they catch up via fetch.
pub fn broadcast_new_message(io: &SocketIo, message: &Message) {
    let room = conversation_room(message.conversation_id);
    if let Err(e) = io.to(room.clone()).emit(NEW_MESSAGE_EVENT, message) {
        tracing::warn!(
            error = %e,
            room = %room,
            message_id = %message.id,
            "new_message fan-out failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_name_is_conversation_scoped() {
        let id: Uuid = "0193e7a0-0000-7000-8000-00000000002a".parse().unwrap();
        assert_eq!(
            conversation_room(id),
            "conversation:0193e7a0-0000-7000-8000-00000000002a"
        );
    }
}
