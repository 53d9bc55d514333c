use uuid::Uuid;

use natter_types::api::Claims;

use crate::error::ApiError;

/// Interpret a raw identifier in the store's id format.
pub fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidUserId(raw.to_string()))
}

/// The authenticated requester, as established by `require_auth`.
pub fn requester_id(claims: &Claims) -> Result<Uuid, ApiError> {
    parse_user_id(&claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_uuid_subjects() {
        let claims = Claims {
            sub: "not-a-uuid".into(),
            username: "alice".into(),
            exp: 0,
        };
        assert!(matches!(requester_id(&claims), Err(ApiError::InvalidUserId(_))));
    }

    #[test]
    fn accepts_hyphenated_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
    }
}
