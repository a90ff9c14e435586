use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use super::extractors::AuthSession;
use crate::state::AppState;

/// Public view of the resolved session identity.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub mailbox_connected: bool,
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(session), fields(email = %session.email))]
pub async fn get_me(session: AuthSession) -> Json<MeResponse> {
    let mailbox_connected = session.access_token.is_some();
    Json(MeResponse {
        email: session.email,
        name: session.name,
        avatar_url: session.avatar_url,
        mailbox_connected,
    })
}

#[cfg(test)]
mod me_tests {
    use super::*;

    #[tokio::test]
    async fn test_me_response_serialization() {
        let session = AuthSession {
            email: "test@example.com".into(),
            name: Some("Test".into()),
            avatar_url: None,
            access_token: Some("ya29.token".into()),
        };
        let Json(response) = get_me(session).await;
        assert!(response.mailbox_connected);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        // the credential itself never appears in the response
        assert!(!json.contains("ya29.token"));
    }
}
