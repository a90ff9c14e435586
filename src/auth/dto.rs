use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SessionConfig;

/// Claims carried by the session token the OAuth front-end mints after
/// sign-in. `gmail_token` is present only when the user granted read-only
/// mailbox scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub gmail_token: Option<String>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

/// Verification-only key material. Token issuance lives in the external
/// auth provider; this service only consumes sessions.
#[derive(Clone)]
pub struct SessionKeys {
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
}

impl SessionKeys {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        debug!(email = %data.claims.email, "session verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;
    use crate::state::AppState;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    fn make_keys() -> SessionKeys {
        let state = AppState::fake();
        SessionKeys::from_config(&state.config.session)
    }

    fn claims(gmail_token: Option<&str>) -> SessionClaims {
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        SessionClaims {
            sub: "google-oauth2|12345".into(),
            email: "user@example.com".into(),
            name: Some("Test User".into()),
            picture: None,
            gmail_token: gmail_token.map(Into::into),
            iat: now,
            exp: now + 3600,
            iss: "test-issuer".into(),
            aud: "test-aud".into(),
        }
    }

    fn sign(claims: &SessionClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"test"),
        )
        .expect("sign session token")
    }

    #[tokio::test]
    async fn verify_roundtrip() {
        let keys = make_keys();
        let token = sign(&claims(Some("ya29.mailbox-token")));
        let verified = keys.verify(&token).expect("verify session");
        assert_eq!(verified.email, "user@example.com");
        assert_eq!(verified.gmail_token.as_deref(), Some("ya29.mailbox-token"));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_secret() {
        let keys = make_keys();
        let token = encode(
            &Header::default(),
            &claims(None),
            &EncodingKey::from_secret(b"other-secret"),
        )
        .expect("sign");
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let mut expired = claims(None);
        expired.exp = expired.iat.saturating_sub(7200);
        expired.iat = expired.exp.saturating_sub(3600);
        assert!(keys.verify(&sign(&expired)).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_wrong_audience() {
        let keys = make_keys();
        let mut wrong = claims(None);
        wrong.aud = "someone-else".into();
        assert!(keys.verify(&sign(&wrong)).is_err());
    }
}
