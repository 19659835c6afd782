use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use worklink_shared::errors::{AppError, AppResult};
use worklink_shared::types::api::ApiResponse;
use worklink_shared::types::auth::AuthUser;
use worklink_shared::types::pagination::{Paginated, PaginationParams};

use crate::events::publisher;
use crate::models::Message;
use crate::services::messages as message_log;
use crate::socket::notifier;
use crate::AppState;

// --- Request / response DTOs ---

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessageResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub conversation_id: Uuid,
    pub marked: usize,
}

// --- Handlers ---

/// GET /conversations/:id/messages - one page of history, oldest first.
pub async fn list_messages(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Message>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let page = message_log::fetch_messages(&mut conn, conversation_id, auth_user.id, &params)?;

    Ok(Json(ApiResponse::ok(page)))
}

/// POST /conversations/:id/messages - append a message and fan it out to
/// live subscribers of the conversation's room.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<Message>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let message = message_log::send_message(&mut conn, conversation_id, auth_user.id, &req.content)?;

    notifier::broadcast_new_message(&state.io, &message);
    publisher::publish_message_sent(&state.rabbitmq, &message).await;

    Ok(Json(ApiResponse::ok(message)))
}

/// DELETE /messages/:id - permanently remove one of the caller's own
/// messages.
pub async fn delete_message(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DeleteMessageResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let deleted = message_log::delete_message(&mut conn, message_id, auth_user.id)?;

    Ok(Json(ApiResponse::ok_with_message(
        DeleteMessageResponse { id: deleted.id },
        "message deleted",
    )))
}

/// POST /conversations/:id/read - mark the conversation's incoming
/// messages as read.
pub async fn mark_as_read(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MarkReadResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let marked = message_log::mark_conversation_read(&mut conn, conversation_id, auth_user.id)?;

    Ok(Json(ApiResponse::ok(MarkReadResponse {
        conversation_id,
        marked,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_response_shape() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(ApiResponse::ok_with_message(
            DeleteMessageResponse { id },
            "message deleted",
        ))
        .unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], id.to_string());
        assert_eq!(json["message"], "message deleted");
    }
}
