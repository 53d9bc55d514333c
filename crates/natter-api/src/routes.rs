use axum::{
    Router,
    http::Uri,
    middleware,
    routing::{get, post},
};

use crate::error::ApiError;
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, messages, profiles};

/// All HTTP routes. Everything except registration, login and health
/// requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/health", get(auth::health));

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/send_message", post(messages::send_message))
        .route("/get_messages", get(messages::get_messages))
        .route("/change_username", post(profiles::change_username))
        .route("/change_custom_status", post(profiles::change_custom_status))
        .route("/user_profile", get(profiles::get_own_profile))
        .route("/user_profile/{user_id}", get(profiles::get_user_profile))
        .route("/get_online_users", get(profiles::get_online_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(no_route)
        .with_state(state)
}

async fn no_route(uri: Uri) -> ApiError {
    ApiError::RouteNotFound(uri.path().to_string())
}
