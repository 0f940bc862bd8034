//! Authenticated request context.
//!
//! Credentials are terminated by the authentication layer in front of this
//! service; it forwards the verified caller identity in the `x-user-id`
//! header.  The extractor checks that the identity parses and resolves to a
//! known user, then hands it to the handler.  No password or token code
//! lives in this repository.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::ApiError;

/// Header carrying the verified caller identity.
pub const USER_HEADER: &str = "x-user-id";

/// The verified identity of the calling user.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub Uuid);

impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| ApiError::BadRequest(format!("invalid {USER_HEADER} header")))?;

        if !state.db.lock().await.user_exists(id)? {
            return Err(ApiError::Unauthorized);
        }

        Ok(Self(id))
    }
}
