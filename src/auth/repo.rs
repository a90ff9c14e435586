use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::extractors::AuthSession;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub gmail_access_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, avatar_url, gmail_access_token, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a user from a resolved session identity.
    pub async fn create(
        db: &PgPool,
        session: &AuthSession,
        gmail_token: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, avatar_url, gmail_access_token)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, avatar_url, gmail_access_token, created_at, updated_at
            "#,
        )
        .bind(&session.email)
        .bind(&session.name)
        .bind(&session.avatar_url)
        .bind(gmail_token)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Store the latest mailbox credential for an existing user.
    pub async fn refresh_access_token(
        db: &PgPool,
        id: Uuid,
        gmail_token: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET gmail_access_token = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(gmail_token)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Resolve the user for this session, creating the row on first sight.
    pub async fn find_or_create(db: &PgPool, session: &AuthSession) -> anyhow::Result<User> {
        if let Some(user) = Self::find_by_email(db, &session.email).await? {
            return Ok(user);
        }
        Self::create(db, session, None).await
    }
}
