use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use natter_db::Database;
use natter_db::models::MessageWithSenderRow;
use natter_types::api::{
    Claims, Envelope, MessageList, MessageSent, MessageUser, MessageView, SendMessageRequest,
};
use natter_types::models::Message;

use crate::error::{ApiError, ApiResult};
use crate::identity::requester_id;
use crate::state::{AppState, OrphanPolicy, run_blocking};

/// Listing never returns more than this many messages.
pub const MESSAGE_LIST_CAP: u32 = 100;

const LIST_ACTION: &str = "fetch messages";

/// POST /send_message
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = state.validator.check(body)?;
    let sender = requester_id(&claims)?;

    if let Some(channel_id) = &req.channel_id {
        debug!("Ignoring channel_id '{}' on message from {}", channel_id, sender);
    }

    let message = run_blocking(&state, move |s| store_message(&s.db, sender, req.content)).await?;

    Ok(Json(
        Envelope::success(MessageSent {
            id: message.id,
            at: message.created_at,
        })
        .with_message("Message sent successfully"),
    ))
}

/// GET /get_messages
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let requester = requester_id(&claims)?;

    let messages = run_blocking(&state, move |s| {
        list_messages(&s.db, requester, s.orphan_policy)
    })
    .await?;

    Ok(Json(Envelope::success(MessageList { messages })))
}

pub fn store_message(db: &Database, sender: Uuid, content: String) -> ApiResult<Message> {
    let message = Message {
        id: Uuid::new_v4(),
        sender_id: sender.to_string(),
        content,
        // Same precision as the stored row.
        created_at: Utc::now().trunc_subsecs(6),
    };

    db.insert_message(&message)
        .map_err(ApiError::persistence("send message"))?;

    Ok(message)
}

/// Up to `MESSAGE_LIST_CAP` of the most recent messages, oldest first, each
/// enriched with its sender's public identity.
pub fn list_messages(
    db: &Database,
    requester: Uuid,
    policy: OrphanPolicy,
) -> ApiResult<Vec<MessageView>> {
    let rows = db
        .get_recent_messages_with_senders(MESSAGE_LIST_CAP)
        .map_err(ApiError::persistence(LIST_ACTION))?;

    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        match decode_message(row, requester) {
            Ok(view) => views.push(view),
            Err(ApiError::MalformedRecord { id, reason, .. }) if policy == OrphanPolicy::Skip => {
                warn!("Skipping message {}: {}", id, reason);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(views)
}

/// Typed decode of one joined row. Any missing or unparsable field is a
/// `MalformedRecord`.
pub fn decode_message(row: MessageWithSenderRow, requester: Uuid) -> ApiResult<MessageView> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|_| ApiError::malformed(LIST_ACTION, &row.id, "message id is not a UUID"))?;

    let sender_id = Uuid::parse_str(&row.sender_id).map_err(|_| {
        ApiError::malformed(LIST_ACTION, &row.id, format!("sender_id '{}' is not a UUID", row.sender_id))
    })?;

    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            ApiError::malformed(LIST_ACTION, &row.id, format!("created_at '{}': {}", row.created_at, e))
        })?;

    let (Some(user_id), Some(username)) = (row.sender_user_id, row.sender_username) else {
        return Err(ApiError::malformed(
            LIST_ACTION,
            &row.id,
            format!("sender '{}' has no user record", row.sender_id),
        ));
    };

    let user_id = Uuid::parse_str(&user_id).map_err(|_| {
        ApiError::malformed(LIST_ACTION, &row.id, format!("joined user id '{}' is not a UUID", user_id))
    })?;

    Ok(MessageView {
        id,
        sender_id,
        me: sender_id == requester,
        created_at,
        content: row.content,
        user: MessageUser {
            id: user_id,
            username,
            profile_picture: row.sender_profile_picture,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined_row(sender: Uuid, username: Option<&str>) -> MessageWithSenderRow {
        MessageWithSenderRow {
            id: Uuid::new_v4().to_string(),
            sender_id: sender.to_string(),
            content: "hi".into(),
            created_at: "2026-01-01T12:00:00.000000Z".into(),
            sender_user_id: username.map(|_| sender.to_string()),
            sender_username: username.map(str::to_string),
            sender_profile_picture: None,
        }
    }

    fn db_with_user(username: &str) -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), username, "hash").unwrap();
        (db, id)
    }

    #[test]
    fn me_is_set_only_for_requester() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let view = decode_message(joined_row(alice, Some("alice")), alice).unwrap();
        assert!(view.me);
        assert_eq!(view.user.username, "alice");

        let view = decode_message(joined_row(alice, Some("alice")), bob).unwrap();
        assert!(!view.me);
    }

    #[test]
    fn missing_sender_is_malformed() {
        let ghost = Uuid::new_v4();
        let err = decode_message(joined_row(ghost, None), ghost).unwrap_err();
        assert!(matches!(err, ApiError::MalformedRecord { .. }));
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let alice = Uuid::new_v4();
        let mut row = joined_row(alice, Some("alice"));
        row.created_at = "yesterday".into();
        assert!(matches!(
            decode_message(row, alice),
            Err(ApiError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn sent_message_is_listed_with_sender() {
        let (db, alice) = db_with_user("alice");
        let sent = store_message(&db, alice, "hi".into()).unwrap();

        let views = list_messages(&db, alice, OrphanPolicy::Reject).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, sent.id);
        assert_eq!(views[0].content, "hi");
        assert_eq!(views[0].sender_id, alice);
        assert!(views[0].me);
        assert_eq!(views[0].user.username, "alice");
    }

    #[test]
    fn returned_timestamp_matches_listed_one() {
        let (db, alice) = db_with_user("alice");
        let sent = store_message(&db, alice, "hi".into()).unwrap();

        let views = list_messages(&db, alice, OrphanPolicy::Reject).unwrap();
        assert_eq!(views[0].created_at, sent.created_at);
    }

    #[test]
    fn listing_is_capped() {
        let (db, alice) = db_with_user("alice");
        for i in 0..(MESSAGE_LIST_CAP + 5) {
            store_message(&db, alice, format!("m{i}")).unwrap();
        }

        let views = list_messages(&db, alice, OrphanPolicy::Reject).unwrap();
        assert_eq!(views.len(), MESSAGE_LIST_CAP as usize);
        assert_eq!(views.last().unwrap().content, format!("m{}", MESSAGE_LIST_CAP + 4));
    }

    #[test]
    fn orphan_policy_skip_drops_record() {
        let (db, alice) = db_with_user("alice");
        store_message(&db, alice, "kept".into()).unwrap();
        store_message(&db, Uuid::new_v4(), "orphan".into()).unwrap();

        let views = list_messages(&db, alice, OrphanPolicy::Skip).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].content, "kept");
    }

    #[test]
    fn orphan_policy_reject_fails_listing() {
        let (db, alice) = db_with_user("alice");
        store_message(&db, alice, "kept".into()).unwrap();
        store_message(&db, Uuid::new_v4(), "orphan".into()).unwrap();

        let err = list_messages(&db, alice, OrphanPolicy::Reject).unwrap_err();
        assert!(matches!(err, ApiError::MalformedRecord { .. }));
    }
}
