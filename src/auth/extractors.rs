use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use tracing::warn;

use super::dto::SessionKeys;
use crate::error::AppError;
use crate::state::AppState;

/// Resolved identity for the current request, extracted from the bearer
/// session token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Read-only mailbox credential; only present when the user granted
    /// mailbox scope at sign-in.
    pub access_token: Option<String>,
}

impl AuthSession {
    /// Mailbox credential, required by email-scan flows.
    pub fn mailbox_token(&self) -> Result<&str, AppError> {
        self.access_token
            .as_deref()
            .ok_or(AppError::MissingMailboxScope)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AppError::Unauthenticated)?;

        let keys = SessionKeys::from_config(&state.config.session);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired session token");
            AppError::Unauthenticated
        })?;

        Ok(AuthSession {
            email: claims.email,
            name: claims.name,
            avatar_url: claims.picture,
            access_token: claims.gmail_token,
        })
    }
}
