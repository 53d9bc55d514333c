use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use natter_db::DbError;
use natter_types::api::Envelope;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid user id '{0}'")]
    InvalidUserId(String),

    #[error("user not found")]
    NotFound,

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("username already taken")]
    UsernameTaken,

    #[error("malformed record {id}: {reason}")]
    MalformedRecord {
        action: &'static str,
        id: String,
        reason: String,
    },

    #[error("no route for {0}")]
    RouteNotFound(String),

    #[error("internal error: {0:#}")]
    Internal(#[source] anyhow::Error),

    #[error("failed to {action}: {source:#}")]
    Persistence {
        action: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    /// Adapter for `map_err` on database results. Unique username violations
    /// keep their own kind; everything else is a persistence failure.
    pub fn persistence(action: &'static str) -> impl FnOnce(anyhow::Error) -> ApiError {
        move |source| match source.downcast_ref::<DbError>() {
            Some(DbError::UsernameTaken) => ApiError::UsernameTaken,
            None => ApiError::Persistence { action, source },
        }
    }

    pub fn malformed(
        action: &'static str,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ApiError::MalformedRecord {
            action,
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) | ApiError::InvalidUserId(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound | ApiError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UsernameTaken => StatusCode::CONFLICT,
            ApiError::MalformedRecord { .. }
            | ApiError::Internal(_)
            | ApiError::Persistence { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Never includes internal detail.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::InvalidPayload(_) => "Invalid request body".into(),
            ApiError::InvalidUserId(_) => "Invalid user ID".into(),
            ApiError::NotFound => "User not found".into(),
            ApiError::Unauthorized(_) => "Unauthorized".into(),
            ApiError::UsernameTaken => "Username already taken".into(),
            ApiError::RouteNotFound(_) => "Not found".into(),
            ApiError::MalformedRecord { action, .. } => format!("Failed to {action}"),
            ApiError::Internal(_) => "Internal server error".into(),
            ApiError::Persistence { action, .. } => format!("Failed to {action}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(Envelope::error(self.public_message()))).into_response()
    }
}
