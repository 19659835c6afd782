use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use worklink_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Conversation, Message, NewConversation, NewConversationParticipant, User};
use crate::schema::{conversation_participants, conversations, messages, users};

// --- Inputs / outputs ---

#[derive(Debug)]
pub struct CreateConversation {
    pub participant_ids: Vec<Uuid>,
    pub is_group: bool,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedConversation {
    #[serde(flatten)]
    pub conversation: Conversation,
    /// False when an existing direct conversation was reused.
    pub created: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct ParticipantProfile {
    pub id: Uuid,
    pub full_name: String,
    pub image_url: Option<String>,
}

impl From<User> for ParticipantProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            image_url: user.image_url,
        }
    }
}

/// One row of the conversation list: the other participants plus a preview
/// of the latest message.
#[derive(Debug, Serialize, Clone)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub is_group: bool,
    pub title: Option<String>,
    pub participants: Vec<ParticipantProfile>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConversationSummary {
    fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }
}

// --- Operations ---

pub fn get_conversation(conn: &mut PgConnection, conversation_id: Uuid) -> AppResult<Conversation> {
    conversations::table
        .find(conversation_id)
        .first::<Conversation>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ConversationNotFound, "conversation not found"))
}

/// Create a conversation for `initiator` with the given invitees, or reuse
/// the existing direct conversation between the same pair of users.
///
/// Inserts run in one transaction: either the conversation and every
/// participant row land, or none do.
pub fn create_conversation(
    conn: &mut PgConnection,
    initiator: Uuid,
    req: &CreateConversation,
) -> AppResult<CreatedConversation> {
    let invitees = normalize_invitees(initiator, &req.participant_ids);
    if invitees.is_empty() {
        return Err(AppError::new(
            ErrorCode::ParticipantsRequired,
            "at least one other participant is required",
        ));
    }

    let title = if req.is_group {
        let title = req.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(AppError::new(
                ErrorCode::TitleRequired,
                "a group conversation requires a title",
            ));
        }
        Some(title.to_string())
    } else {
        if invitees.len() != 1 {
            return Err(AppError::Validation(
                "a direct conversation takes exactly one other participant".into(),
            ));
        }
        None
    };

    let mut referenced = invitees.clone();
    referenced.push(initiator);
    let missing = missing_users(conn, &referenced)?;
    if !missing.is_empty() {
        return Err(AppError::with_details(
            ErrorCode::ParticipantsNotFound,
            "some participants do not exist",
            serde_json::json!({ "missing_user_ids": missing }),
        ));
    }

    if !req.is_group {
        if let Some(existing_id) = find_direct_between(conn, initiator, invitees[0])? {
            let conversation = get_conversation(conn, existing_id)?;
            return Ok(CreatedConversation {
                conversation,
                created: false,
            });
        }
    }

    let conversation = conn.transaction::<Conversation, AppError, _>(|conn| {
        let conversation: Conversation = diesel::insert_into(conversations::table)
            .values(&NewConversation {
                created_by: Some(initiator),
                is_group: req.is_group,
                title: title.clone(),
            })
            .get_result(conn)?;

        let mut rows = vec![NewConversationParticipant {
            conversation_id: conversation.id,
            user_id: initiator,
        }];
        rows.extend(invitees.iter().map(|uid| NewConversationParticipant {
            conversation_id: conversation.id,
            user_id: *uid,
        }));

        diesel::insert_into(conversation_participants::table)
            .values(&rows)
            .execute(conn)?;

        Ok(conversation)
    })?;

    tracing::info!(
        conversation_id = %conversation.id,
        initiator = %initiator,
        is_group = req.is_group,
        "conversation created"
    );

    Ok(CreatedConversation {
        conversation,
        created: true,
    })
}

/// The direct-conversation dedupe check: an existing non-group conversation
/// whose participant set is exactly the unordered pair {user_a, user_b}.
pub fn find_direct_between(
    conn: &mut PgConnection,
    user_a: Uuid,
    user_b: Uuid,
) -> AppResult<Option<Uuid>> {
    let candidate_ids: Vec<Uuid> = conversation_participants::table
        .inner_join(conversations::table)
        .filter(conversations::is_group.eq(false))
        .filter(conversation_participants::user_id.eq(user_a))
        .select(conversation_participants::conversation_id)
        .load(conn)?;

    for conversation_id in candidate_ids {
        let members: Vec<Uuid> = conversation_participants::table
            .filter(conversation_participants::conversation_id.eq(conversation_id))
            .select(conversation_participants::user_id)
            .load(conn)?;

        if members.len() == 2 && members.contains(&user_b) {
            return Ok(Some(conversation_id));
        }
    }

    Ok(None)
}

/// All conversations `user_id` participates in, most recent activity first.
///
/// Fetches only the single latest message per conversation, never the
/// history; recency falls back to the conversation's creation time when no
/// message exists yet.
pub fn list_conversations(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Vec<ConversationSummary>> {
    let conversation_ids: Vec<Uuid> = conversation_participants::table
        .filter(conversation_participants::user_id.eq(user_id))
        .select(conversation_participants::conversation_id)
        .load(conn)?;

    if conversation_ids.is_empty() {
        return Ok(vec![]);
    }

    let convs: Vec<Conversation> = conversations::table
        .filter(conversations::id.eq_any(&conversation_ids))
        .load(conn)?;

    let mut summaries = Vec::with_capacity(convs.len());
    for conv in convs {
        let last_msg: Option<Message> = messages::table
            .filter(messages::conversation_id.eq(conv.id))
            .order(messages::created_at.desc())
            .first::<Message>(conn)
            .optional()?;

        let others: Vec<User> = conversation_participants::table
            .inner_join(users::table)
            .filter(conversation_participants::conversation_id.eq(conv.id))
            .filter(conversation_participants::user_id.ne(user_id))
            .select(users::all_columns)
            .load(conn)?;

        summaries.push(ConversationSummary {
            id: conv.id,
            is_group: conv.is_group,
            title: conv.title,
            participants: others.into_iter().map(ParticipantProfile::from).collect(),
            last_message: last_msg.as_ref().map(|m| m.content.clone()),
            last_message_at: last_msg.map(|m| m.created_at),
            created_at: conv.created_at,
        });
    }

    sort_by_recency(&mut summaries);
    Ok(summaries)
}

/// Invitee list as stored: deduplicated, initiator excluded.
fn normalize_invitees(initiator: Uuid, participant_ids: &[Uuid]) -> Vec<Uuid> {
    let mut invitees: Vec<Uuid> = Vec::with_capacity(participant_ids.len());
    for id in participant_ids {
        if *id != initiator && !invitees.contains(id) {
            invitees.push(*id);
        }
    }
    invitees
}

fn missing_users(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<Vec<Uuid>> {
    let found: Vec<Uuid> = users::table
        .filter(users::id.eq_any(ids))
        .select(users::id)
        .load(conn)?;

    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

fn sort_by_recency(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary(seed: u32, created_at: DateTime<Utc>, last_message_at: Option<DateTime<Utc>>) -> ConversationSummary {
        ConversationSummary {
            id: Uuid::from_u128(seed as u128),
            is_group: false,
            title: None,
            participants: vec![],
            last_message: last_message_at.map(|_| "hi".into()),
            last_message_at,
            created_at,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn invitees_are_deduplicated_and_exclude_initiator() {
        let me = Uuid::from_u128(1);
        let other = Uuid::from_u128(2);
        let third = Uuid::from_u128(3);

        let invitees = normalize_invitees(me, &[other, other, me, third]);
        assert_eq!(invitees, vec![other, third]);

        assert!(normalize_invitees(me, &[me, me]).is_empty());
    }

    #[test]
    fn recency_prefers_latest_message_over_creation() {
        // c1: created long ago but messaged recently; c2: created recently,
        // never messaged; c3: old and quiet.
        let mut summaries = vec![
            summary(3, at(0), None),
            summary(1, at(10), Some(at(500))),
            summary(2, at(300), None),
        ];
        sort_by_recency(&mut summaries);

        let order: Vec<Uuid> = summaries.iter().map(|s| s.id).collect();
        assert_eq!(
            order,
            vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]
        );
    }

    #[test]
    fn summary_serializes_with_fixed_shape() {
        let s = summary(7, at(0), Some(at(60)));
        let json = serde_json::to_value(&s).unwrap();

        assert_eq!(json["id"], Uuid::from_u128(7).to_string());
        assert_eq!(json["last_message"], "hi");
        assert!(json["participants"].as_array().unwrap().is_empty());
        assert!(json.get("last_activity").is_none());
    }
}
