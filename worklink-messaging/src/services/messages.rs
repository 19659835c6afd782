use chrono::Utc;
use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use worklink_shared::errors::{AppError, AppResult, ErrorCode};
use worklink_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::{Message, NewMessage};
use crate::schema::messages;
use crate::services::{conversations, membership};

/// Append a message to a conversation the sender participates in.
///
/// Content is trimmed first; whitespace-only input is rejected before any
/// write. Fan-out to live subscribers happens at the caller, after commit.
pub fn send_message(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
) -> AppResult<Message> {
    let content = validate_content(content)?;

    conversations::get_conversation(conn, conversation_id)?;
    membership::require_participant(conn, conversation_id, sender_id)?;

    let message: Message = diesel::insert_into(messages::table)
        .values(&NewMessage {
            conversation_id,
            sender_id,
            content: content.to_string(),
        })
        .get_result(conn)?;

    tracing::debug!(
        message_id = %message.id,
        conversation_id = %conversation_id,
        sender = %sender_id,
        "message stored"
    );

    Ok(message)
}

/// One page of a conversation's history, chronologically ascending: page 1
/// starts at the oldest message, the way a chat transcript renders.
pub fn fetch_messages(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
    params: &PaginationParams,
) -> AppResult<Paginated<Message>> {
    conversations::get_conversation(conn, conversation_id)?;
    membership::require_participant(conn, conversation_id, user_id)?;

    let total: i64 = messages::table
        .filter(messages::conversation_id.eq(conversation_id))
        .select(count_star())
        .first(conn)?;

    let items: Vec<Message> = messages::table
        .filter(messages::conversation_id.eq(conversation_id))
        .order(messages::created_at.asc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .load(conn)?;

    Ok(Paginated::new(items, total as u64, params))
}

/// Permanently remove a message. Only its sender may do this; other
/// participants, the conversation creator included, may not.
pub fn delete_message(
    conn: &mut PgConnection,
    message_id: Uuid,
    user_id: Uuid,
) -> AppResult<Message> {
    let message: Message = messages::table
        .find(message_id)
        .first::<Message>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::MessageNotFound, "message not found"))?;

    if message.sender_id != user_id {
        return Err(AppError::new(
            ErrorCode::NotMessageSender,
            "you can only delete your own messages",
        ));
    }

    diesel::delete(messages::table.find(message_id)).execute(conn)?;

    tracing::info!(message_id = %message_id, sender = %user_id, "message deleted");
    Ok(message)
}

/// Flag every unread message in the conversation that the caller did not
/// send. Returns how many were flagged.
pub fn mark_conversation_read(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> AppResult<usize> {
    conversations::get_conversation(conn, conversation_id)?;
    membership::require_participant(conn, conversation_id, user_id)?;

    let updated = diesel::update(
        messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .filter(messages::sender_id.ne(user_id))
            .filter(messages::is_read.eq(false)),
    )
    .set((messages::is_read.eq(true), messages::read_at.eq(Utc::now())))
    .execute(conn)?;

    Ok(updated)
}

fn validate_content(raw: &str) -> AppResult<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::new(
            ErrorCode::EmptyMessageContent,
            "message content is required",
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed() {
        assert_eq!(validate_content("  hello  ").unwrap(), "hello");
    }

    #[test]
    fn empty_and_whitespace_content_is_rejected() {
        for raw in ["", "   ", "\n\t", " \r\n "] {
            let err = validate_content(raw).unwrap_err();
            match err {
                AppError::Known { code, .. } => assert_eq!(code, ErrorCode::EmptyMessageContent),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
