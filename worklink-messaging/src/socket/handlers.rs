use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use socketioxide::extract::{Data, SocketRef};
use uuid::Uuid;

use worklink_shared::errors::{AppError, ErrorCode};
use worklink_shared::types::auth::Claims;
use worklink_shared::types::pagination::PaginationParams;

use crate::events::publisher;
use crate::services::{conversations, membership, messages as message_log};
use crate::socket::notifier;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

fn get_user_id(socket: &SocketRef) -> Option<Uuid> {
    socket.extensions.get::<Uuid>()
}

fn parse_uuid_field(payload: &Value, field: &str) -> Option<Uuid> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn error_payload(err: &AppError) -> ErrorPayload {
    match err {
        AppError::Known { code, message, .. } => ErrorPayload {
            code: code.code().into(),
            message: message.clone(),
        },
        AppError::Validation(msg) => ErrorPayload {
            code: "E0002".into(),
            message: msg.clone(),
        },
        AppError::Database(diesel::result::Error::NotFound) => ErrorPayload {
            code: "E0003".into(),
            message: "resource not found".into(),
        },
        _ => ErrorPayload {
            code: "E0001".into(),
            message: "internal error".into(),
        },
    }
}

fn emit_error(socket: &SocketRef, err: &AppError) {
    let _ = socket.emit("error", &error_payload(err));
}

pub async fn on_connect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let user_id = match authenticate_socket(&socket, &state) {
        Ok(id) => id,
        Err(msg) => {
            tracing::warn!(error = %msg, "messaging socket auth failed");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "E1002".into(),
                    message: msg,
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    socket.extensions.insert(user_id);

    tracing::info!(user_id = %user_id, sid = %socket.id, "messaging socket connected");

    let _ = socket.emit("connected", &serde_json::json!({ "user_id": user_id }));

    socket.on("join_conversation", {
        let state = state.clone();
        move |socket: SocketRef, Data::<Value>(payload)| {
            let state = state.clone();
            async move { on_join_conversation(socket, payload, &state).await; }
        }
    });

    socket.on("leave_conversation", |socket: SocketRef, Data::<Value>(payload)| async move {
        on_leave_conversation(socket, payload);
    });

    socket.on("send_message", {
        let state = state.clone();
        move |socket: SocketRef, Data::<Value>(payload)| {
            let state = state.clone();
            async move { on_send_message(socket, payload, &state).await; }
        }
    });

    socket.on("get_messages", {
        let state = state.clone();
        move |socket: SocketRef, Data::<Value>(payload)| {
            let state = state.clone();
            async move { on_get_messages(socket, payload, &state).await; }
        }
    });

    socket.on_disconnect(|socket: SocketRef| async move {
        if let Some(user_id) = get_user_id(&socket) {
            tracing::info!(user_id = %user_id, sid = %socket.id, "messaging socket disconnected");
        }
    });
}

/// Join a conversation's room. Rejected with an `error` event, never
/// silently, when the caller is not a participant.
async fn on_join_conversation(socket: SocketRef, payload: Value, state: &Arc<AppState>) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    let conversation_id = match parse_uuid_field(&payload, "conversation_id") {
        Some(id) => id,
        None => {
            emit_error(&socket, &AppError::Validation("conversation_id is required".into()));
            return;
        }
    };

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            emit_error(&socket, &AppError::Internal(e.into()));
            return;
        }
    };

    let authorized = conversations::get_conversation(&mut conn, conversation_id)
        .and_then(|_| membership::is_participant(&mut conn, conversation_id, user_id));

    match authorized {
        Ok(true) => {
            socket.join(notifier::conversation_room(conversation_id)).ok();
            let _ = socket.emit("joined", &serde_json::json!({ "conversation_id": conversation_id }));
            tracing::debug!(user_id = %user_id, conversation_id = %conversation_id, "joined conversation room");
        }
        Ok(false) => {
            emit_error(
                &socket,
                &AppError::new(
                    ErrorCode::NotConversationParticipant,
                    "you are not a participant of this conversation",
                ),
            );
        }
        Err(err) => emit_error(&socket, &err),
    }
}

fn on_leave_conversation(socket: SocketRef, payload: Value) {
    if let Some(conversation_id) = parse_uuid_field(&payload, "conversation_id") {
        socket.leave(notifier::conversation_room(conversation_id)).ok();
        let _ = socket.emit("left", &serde_json::json!({ "conversation_id": conversation_id }));
    }
}

/// Socket-path send: same validation, guard, and insert as the REST route,
/// then room fan-out.
async fn on_send_message(socket: SocketRef, payload: Value, state: &Arc<AppState>) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    let conversation_id = match parse_uuid_field(&payload, "conversation_id") {
        Some(id) => id,
        None => {
            emit_error(&socket, &AppError::Validation("conversation_id is required".into()));
            return;
        }
    };
    let content = payload.get("content").and_then(|v| v.as_str()).unwrap_or_default();

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            emit_error(&socket, &AppError::Internal(e.into()));
            return;
        }
    };

    match message_log::send_message(&mut conn, conversation_id, user_id, content) {
        Ok(message) => {
            notifier::broadcast_new_message(&state.io, &message);
            publisher::publish_message_sent(&state.rabbitmq, &message).await;
        }
        Err(err) => emit_error(&socket, &err),
    }
}

/// Socket-path fetch: replies to the requesting socket with one page,
/// oldest first.
async fn on_get_messages(socket: SocketRef, payload: Value, state: &Arc<AppState>) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    let conversation_id = match parse_uuid_field(&payload, "conversation_id") {
        Some(id) => id,
        None => {
            emit_error(&socket, &AppError::Validation("conversation_id is required".into()));
            return;
        }
    };

    let params = PaginationParams {
        page: payload.get("page").and_then(|v| v.as_u64()).unwrap_or(1),
        per_page: payload.get("per_page").and_then(|v| v.as_u64()).unwrap_or(20),
    };

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            emit_error(&socket, &AppError::Internal(e.into()));
            return;
        }
    };

    match message_log::fetch_messages(&mut conn, conversation_id, user_id, &params) {
        Ok(page) => {
            let _ = socket.emit("messages", &page);
        }
        Err(err) => emit_error(&socket, &err),
    }
}

fn authenticate_socket(socket: &SocketRef, state: &Arc<AppState>) -> Result<Uuid, String> {
    let connect_info = socket.req_parts();

    // Token arrives as a ?token=xxx query parameter
    let query = connect_info.uri.query().unwrap_or_default();
    let token = query
        .split('&')
        .find_map(|pair| {
            let mut split = pair.splitn(2, '=');
            let key = split.next()?;
            let value = split.next()?;
            if key == "token" {
                Some(value.to_string())
            } else {
                None
            }
        })
        .ok_or_else(|| "missing token query parameter".to_string())?;

    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = jsonwebtoken::decode::<Claims>(
        &token,
        &jsonwebtoken::DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("invalid token: {e}"))?;

    if token_data.claims.is_expired() {
        return Err("token has expired".into());
    }

    Ok(token_data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_fields_parse_from_strings_only() {
        let id = Uuid::new_v4();
        let payload = serde_json::json!({ "conversation_id": id.to_string(), "page": 2 });

        assert_eq!(parse_uuid_field(&payload, "conversation_id"), Some(id));
        assert_eq!(parse_uuid_field(&payload, "page"), None);
        assert_eq!(parse_uuid_field(&payload, "missing"), None);
    }

    #[test]
    fn known_errors_keep_their_machine_code() {
        let err = AppError::new(ErrorCode::NotConversationParticipant, "nope");
        let payload = error_payload(&err);
        assert_eq!(payload.code, "E2002");
        assert_eq!(payload.message, "nope");
    }

    #[test]
    fn internal_errors_are_redacted() {
        let err = AppError::Internal(anyhow::anyhow!("pool timed out on conn 7"));
        let payload = error_payload(&err);
        assert_eq!(payload.code, "E0001");
        assert_eq!(payload.message, "internal error");
    }
}
