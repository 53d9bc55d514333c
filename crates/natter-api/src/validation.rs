use axum::{Json, extract::rejection::JsonRejection};
use tracing::debug;
use validator::Validate;

use natter_types::api::{
    ChangeStatusRequest, ChangeUsernameRequest, LoginRequest, RegisterRequest, SendMessageRequest,
};

use crate::error::ApiError;

/// Cleanup applied to a decoded body before its rules are checked.
pub trait Normalize {
    fn normalize(&mut self) {}
}

impl Normalize for SendMessageRequest {}

impl Normalize for LoginRequest {}

impl Normalize for RegisterRequest {
    fn normalize(&mut self) {
        self.username = self.username.trim().to_string();
    }
}

impl Normalize for ChangeUsernameRequest {}

impl Normalize for ChangeStatusRequest {}

/// Checks inbound JSON bodies. Holds no state; one instance is built at
/// startup and shared through `AppState`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator;

impl RequestValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn check<T>(&self, body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError>
    where
        T: Validate + Normalize,
    {
        let Json(mut req) = body.map_err(|rejection| {
            debug!("Rejected request body: {}", rejection.body_text());
            ApiError::InvalidPayload(rejection.body_text())
        })?;

        req.normalize();
        req.validate().map_err(|errors| {
            debug!("Request failed validation: {}", errors);
            ApiError::InvalidPayload(errors.to_string())
        })?;

        Ok(req)
    }
}
