use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// -- JWT Claims --

/// Bearer token claims. `sub` is kept as the raw string from the token so a
/// malformed subject surfaces as an invalid user id rather than a 401.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

// -- Envelope --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Uniform response body: `{status, message?, ...payload}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(payload: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: None,
            payload,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Envelope<NoPayload> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: Some(message.into()),
            payload: NoPayload {},
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct NoPayload {}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

// -- Auth --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32), custom(function = "not_blank"))]
    pub username: String,
    #[validate(length(min = 8, max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Messages --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000), custom(function = "not_blank"))]
    pub content: String,
    /// Accepted for client compatibility; messages are not channel scoped.
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageSent {
    pub id: Uuid,
    pub at: DateTime<Utc>,
}

/// Public identity of a message's sender, joined in at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageUser {
    pub id: Uuid,
    pub username: String,
    pub profile_picture: Option<String>,
}

/// A message enriched with its sender. Built per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub me: bool,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub user: MessageUser,
}

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<MessageView>,
}

// -- Profiles --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ChangeUsernameRequest {
    /// Stored exactly as sent. The 3..=32 rule only applies at registration.
    #[validate(custom(function = "not_blank"))]
    pub username: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ChangeStatusRequest {
    #[validate(custom(function = "not_blank"))]
    pub custom_status: String,
}

/// Public projection of a user. Credentials and presence never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub custom_status: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfilePayload {
    pub user_profile: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct OnlineUsers {
    pub online_users: Vec<UserProfile>,
}
