use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use worklink_shared::errors::{AppError, AppResult, ErrorCode};

use crate::schema::conversation_participants;

/// Whether `user_id` is a listed participant of `conversation_id`.
///
/// Pure read, no side effects. Returns `false` rather than erroring so the
/// caller decides how to answer (HTTP 403, socket `error` event).
pub fn is_participant(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> AppResult<bool> {
    let count: i64 = conversation_participants::table
        .filter(conversation_participants::conversation_id.eq(conversation_id))
        .filter(conversation_participants::user_id.eq(user_id))
        .select(count_star())
        .first(conn)?;

    Ok(count > 0)
}

/// Gate for every conversation-scoped read or write.
pub fn require_participant(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    if !is_participant(conn, conversation_id, user_id)? {
        return Err(AppError::new(
            ErrorCode::NotConversationParticipant,
            "you are not a participant of this conversation",
        ));
    }
    Ok(())
}
