//! Webhook error taxonomy and response mapping.
//!
//! Delivery failures are classified into stable codes the CRM can
//! localize on its side; everything unexpected becomes a 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use teloxide::{ApiError, RequestError};
use thiserror::Error;

pub const ERROR_BOT_BLOCKED: &str = "BOT_BLOCKED";
pub const ERROR_NOT_STARTED: &str = "INVALID_TELEGRAM_ID_OR_NOT_STARTED";
pub const ERROR_ID_FORMAT: &str = "INVALID_TELEGRAM_ID_FORMAT";
pub const ERROR_TELEGRAM: &str = "TELEGRAM_ERROR";

#[derive(Debug, Error)]
pub enum WebhookError {
    /// Malformed request payload, nothing was sent
    #[error("{0}")]
    BadRequest(String),

    /// Target identifier is not a 7-15 digit number
    #[error("{ERROR_ID_FORMAT}")]
    InvalidIdFormat,

    /// The user blocked the bot
    #[error("{ERROR_BOT_BLOCKED}")]
    BotBlocked,

    /// The id is unknown to Telegram or the user never started the bot
    #[error("{ERROR_NOT_STARTED}")]
    NotReachable,

    /// Any other Telegram API refusal, passed through verbatim
    #[error("{0}")]
    Telegram(String),

    /// Unexpected failure, surfaced as a 500
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    /// Classify a failed outbound send
    pub fn from_send(e: RequestError) -> Self {
        match e {
            RequestError::Api(ApiError::BotBlocked) => Self::BotBlocked,
            RequestError::Api(
                ApiError::ChatNotFound
                | ApiError::UserNotFound
                | ApiError::CantInitiateConversation,
            ) => Self::NotReachable,
            RequestError::Api(api) => Self::Telegram(api.to_string()),
            other => Self::Internal(other.into()),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::BadRequest(_) | Self::Internal(_) => None,
            Self::InvalidIdFormat => Some(ERROR_ID_FORMAT),
            Self::BotBlocked => Some(ERROR_BOT_BLOCKED),
            Self::NotReachable => Some(ERROR_NOT_STARTED),
            Self::Telegram(_) => Some(ERROR_TELEGRAM),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let Some(code) = self.error_code() {
            body["errorCode"] = json!(code);
        }
        (self.status(), Json(body)).into_response()
    }
}
