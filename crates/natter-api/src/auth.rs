use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use natter_types::api::{
    Claims, Envelope, LoginRequest, LoginResponse, NoPayload, RegisterRequest, RegisterResponse,
};
use natter_types::models::PresenceStatus;

use crate::error::{ApiError, ApiResult};
use crate::identity::requester_id;
use crate::state::{AppState, run_blocking};

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = state.validator.check(body)?;

    let user_id = Uuid::new_v4();
    let username = req.username.clone();

    run_blocking(&state, move |s| {
        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
            .to_string();

        s.db.create_user(&user_id.to_string(), &req.username, &password_hash)
            .map_err(ApiError::persistence("register user"))
    })
    .await?;

    let token = create_token(&state, user_id, &username)?;
    info!("Registered user {} ({})", username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(
            Envelope::success(RegisterResponse { user_id, token })
                .with_message("User registered successfully"),
        ),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = state.validator.check(body)?;

    let user = run_blocking(&state, move |s| {
        let user = s
            .db
            .get_user_by_username(&req.username)
            .map_err(ApiError::persistence("log in"))?
            .ok_or(ApiError::Unauthorized("unknown username"))?;

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| ApiError::malformed("log in", &user.id, "stored password hash is not a PHC string"))?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized("wrong password"))?;

        s.db.set_presence(&user.id, PresenceStatus::Online)
            .map_err(ApiError::persistence("log in"))?;

        Ok(user)
    })
    .await?;

    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| ApiError::malformed("log in", &user.id, "user id is not a UUID"))?;
    let token = create_token(&state, user_id, &user.username)?;

    Ok(Json(Envelope::success(LoginResponse {
        user_id,
        username: user.username,
        token,
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user_id = requester_id(&claims)?;

    run_blocking(&state, move |s| {
        s.db.set_presence(&user_id.to_string(), PresenceStatus::Offline)
            .map_err(ApiError::persistence("log out"))
    })
    .await?;

    Ok(Json(Envelope::success(NoPayload {}).with_message("Logged out successfully")))
}

pub async fn health() -> impl IntoResponse {
    Json(Envelope::success(NoPayload {}))
}

pub fn create_token(state: &AppState, user_id: Uuid, username: &str) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))
}
