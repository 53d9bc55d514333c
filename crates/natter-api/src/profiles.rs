use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use natter_db::Database;
use natter_db::models::UserRow;
use natter_types::api::{
    ChangeStatusRequest, ChangeUsernameRequest, Claims, Envelope, NoPayload, OnlineUsers,
    ProfilePayload, UserProfile,
};
use natter_types::models::PresenceStatus;

use crate::error::{ApiError, ApiResult};
use crate::identity::{parse_user_id, requester_id};
use crate::state::{AppState, run_blocking};

/// POST /change_username
pub async fn change_username(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<ChangeUsernameRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = state.validator.check(body)?;
    let user_id = requester_id(&claims)?;

    run_blocking(&state, move |s| rename_user(&s.db, user_id, &req.username)).await?;

    Ok(Json(Envelope::success(NoPayload {}).with_message("Username changed successfully")))
}

/// POST /change_custom_status
pub async fn change_custom_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = state.validator.check(body)?;
    let user_id = requester_id(&claims)?;

    run_blocking(&state, move |s| set_custom_status(&s.db, user_id, &req.custom_status)).await?;

    Ok(Json(Envelope::success(NoPayload {}).with_message("Status changed successfully")))
}

/// GET /user_profile/{user_id}
pub async fn get_user_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user_id = parse_user_id(&user_id)?;
    let user_profile = run_blocking(&state, move |s| find_profile(&s.db, user_id)).await?;

    Ok(Json(Envelope::success(ProfilePayload { user_profile })))
}

/// GET /user_profile
pub async fn get_own_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user_id = requester_id(&claims)?;
    let user_profile = run_blocking(&state, move |s| find_profile(&s.db, user_id)).await?;

    Ok(Json(Envelope::success(ProfilePayload { user_profile })))
}

/// GET /get_online_users
pub async fn get_online_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let online_users = run_blocking(&state, |s| online_profiles(&s.db)).await?;

    Ok(Json(Envelope::success(OnlineUsers { online_users })))
}

pub fn rename_user(db: &Database, user_id: Uuid, username: &str) -> ApiResult<()> {
    let updated = db
        .update_username(&user_id.to_string(), username)
        .map_err(ApiError::persistence("change username"))?;
    if !updated {
        return Err(ApiError::NotFound);
    }
    info!("User {} renamed to {}", user_id, username);
    Ok(())
}

pub fn set_custom_status(db: &Database, user_id: Uuid, custom_status: &str) -> ApiResult<()> {
    let updated = db
        .update_custom_status(&user_id.to_string(), custom_status)
        .map_err(ApiError::persistence("change status"))?;
    if !updated {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn find_profile(db: &Database, user_id: Uuid) -> ApiResult<UserProfile> {
    let row = db
        .get_user_by_id(&user_id.to_string())
        .map_err(ApiError::persistence("fetch user profile"))?
        .ok_or(ApiError::NotFound)?;
    to_profile(row, "fetch user profile")
}

/// Profiles of users whose presence is exactly online. Empty when nobody is.
pub fn online_profiles(db: &Database) -> ApiResult<Vec<UserProfile>> {
    db.get_users_with_presence(PresenceStatus::Online)
        .map_err(ApiError::persistence("fetch online users"))?
        .into_iter()
        .map(|row| to_profile(row, "fetch online users"))
        .collect()
}

/// Public projection. The password hash and presence stay behind.
fn to_profile(row: UserRow, action: &'static str) -> ApiResult<UserProfile> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|_| ApiError::malformed(action, &row.id, "user id is not a UUID"))?;

    Ok(UserProfile {
        id,
        username: row.username,
        custom_status: row.custom_status,
        profile_picture: row.profile_picture,
    })
}
