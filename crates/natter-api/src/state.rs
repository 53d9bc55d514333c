use std::str::FromStr;
use std::sync::Arc;

use natter_db::Database;
use tracing::error;

use crate::error::ApiError;
use crate::validation::RequestValidator;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub validator: RequestValidator,
    pub orphan_policy: OrphanPolicy,
}

/// What to do with a listed message whose sender cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Drop the message from the listing and log it.
    #[default]
    Skip,
    /// Fail the whole listing.
    Reject,
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(OrphanPolicy::Skip),
            "reject" => Ok(OrphanPolicy::Reject),
            other => Err(format!("unknown orphan message policy '{other}' (expected skip or reject)")),
        }
    }
}

/// Run a database closure off the async runtime.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}
