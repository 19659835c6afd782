use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use worklink_shared::errors::{AppError, AppResult};
use worklink_shared::types::api::ApiResponse;
use worklink_shared::types::auth::AuthUser;

use crate::events::publisher;
use crate::services::conversations::{
    self, ConversationSummary, CreateConversation, CreatedConversation,
};
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_group: bool,
    pub title: Option<String>,
}

// --- Handlers ---

/// POST /conversations - start a conversation, reusing an existing direct
/// one between the same pair of users.
pub async fn create_conversation(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConversationRequest>,
) -> AppResult<Json<ApiResponse<CreatedConversation>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let result = conversations::create_conversation(
        &mut conn,
        auth_user.id,
        &CreateConversation {
            participant_ids: req.participant_ids,
            is_group: req.is_group,
            title: req.title,
        },
    )?;

    if result.created {
        publisher::publish_conversation_created(
            &state.rabbitmq,
            &result.conversation,
            auth_user.id,
        )
        .await;
    }

    Ok(Json(ApiResponse::ok(result)))
}

/// GET /conversations - the caller's conversations, most recent activity
/// first, each with the other participants and a latest-message preview.
pub async fn list_conversations(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<ConversationSummary>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let summaries = conversations::list_conversations(&mut conn, auth_user.id)?;

    Ok(Json(ApiResponse::ok(summaries)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_group_defaults_to_false() {
        let req: CreateConversationRequest = serde_json::from_str(
            r#"{ "participant_ids": ["0193e7a0-0000-7000-8000-000000000001"] }"#,
        )
        .unwrap();
        assert!(!req.is_group);
        assert!(req.title.is_none());
        assert_eq!(req.participant_ids.len(), 1);
    }
}
