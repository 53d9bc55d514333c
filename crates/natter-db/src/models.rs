/// Database row types — these map directly to SQLite rows.
/// Distinct from natter-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub custom_status: Option<String>,
    pub profile_picture: Option<String>,
    pub status: String,
    pub created_at: String,
}

/// A message joined against `users`. The sender columns are `None` when no
/// user matches `sender_id`.
pub struct MessageWithSenderRow {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
    pub sender_user_id: Option<String>,
    pub sender_username: Option<String>,
    pub sender_profile_picture: Option<String>,
}
