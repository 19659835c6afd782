use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{range}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth/token errors
/// - E2xxx: Messaging errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    BadRequest,
    ServiceUnavailable,

    // Auth (E1xxx)
    TokenExpired,
    TokenInvalid,

    // Messaging (E2xxx)
    ConversationNotFound,
    NotConversationParticipant,
    MessageNotFound,
    NotMessageSender,
    EmptyMessageContent,
    TitleRequired,
    ParticipantsRequired,
    ParticipantsNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::Conflict => "E0006",
            Self::BadRequest => "E0007",
            Self::ServiceUnavailable => "E0008",

            // Auth
            Self::TokenExpired => "E1001",
            Self::TokenInvalid => "E1002",

            // Messaging
            Self::ConversationNotFound => "E2001",
            Self::NotConversationParticipant => "E2002",
            Self::MessageNotFound => "E2003",
            Self::NotMessageSender => "E2004",
            Self::EmptyMessageContent => "E2005",
            Self::TitleRequired => "E2006",
            Self::ParticipantsRequired => "E2007",
            Self::ParticipantsNotFound => "E2008",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::ServiceUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::EmptyMessageContent
            | Self::TitleRequired | Self::ParticipantsRequired => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::ConversationNotFound | Self::MessageNotFound
            | Self::ParticipantsNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotConversationParticipant | Self::NotMessageSender => {
                StatusCode::FORBIDDEN
            }
            Self::Conflict => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn messaging_codes_are_stable() {
        assert_eq!(ErrorCode::ConversationNotFound.code(), "E2001");
        assert_eq!(ErrorCode::NotConversationParticipant.code(), "E2002");
        assert_eq!(ErrorCode::NotMessageSender.code(), "E2004");
        assert_eq!(ErrorCode::EmptyMessageContent.code(), "E2005");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ErrorCode::EmptyMessageContent.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ParticipantsNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::NotConversationParticipant.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        let err = AppError::new(ErrorCode::ConversationNotFound, "conversation not found");
        let value = body_json(err).await;

        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E2001");
        assert_eq!(value["error"]["message"], "conversation not found");
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn details_carry_missing_ids() {
        let err = AppError::with_details(
            ErrorCode::ParticipantsNotFound,
            "some participants do not exist",
            serde_json::json!({ "missing_user_ids": ["0193e7a0-0000-7000-8000-000000000001"] }),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["error"]["details"]["missing_user_ids"][0],
            "0193e7a0-0000-7000-8000-000000000001");
    }

    #[tokio::test]
    async fn database_not_found_maps_to_404() {
        let err = AppError::Database(diesel::result::Error::NotFound);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validation_maps_to_400() {
        let value = body_json(AppError::Validation("participant_ids is required".into())).await;
        assert_eq!(value["error"]["code"], "E0002");
        assert_eq!(value["error"]["message"], "participant_ids is required");
    }
}
