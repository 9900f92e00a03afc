use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::session::Session;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub username: String,
}

/// The request's [`Session`], as installed by the session middleware.
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("Session layer not installed".into()))
    }
}

/// Optional user extractor. `None` means the client is anonymous; handlers
/// decide what that is allowed to do.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let user = session
            .username()
            .await
            .map(|username| CurrentUser { username });
        Ok(MaybeUser(user))
    }
}
