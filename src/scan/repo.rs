use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::mailbox::EmailRecord;

/// Record that a message has been seen for this user. Returns true when a
/// new row was written; repeat sightings of the same (user, message) pair
/// are a no-op, which is what makes re-scans idempotent.
pub async fn record_email_seen(
    db: &PgPool,
    user_id: Uuid,
    email: &EmailRecord,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO email_scans (user_id, gmail_message_id, subject, sender, received_date, status)
        VALUES ($1, $2, $3, $4, $5, 'pending')
        ON CONFLICT (user_id, gmail_message_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(&email.id)
    .bind(&email.subject)
    .bind(&email.from)
    .bind(&email.date)
    .execute(db)
    .await
    .context("insert email scan row")?;
    Ok(result.rows_affected() > 0)
}

/// Persist a statement analysis: extracted result and count only, never the
/// raw statement text.
pub async fn insert_card_analysis(
    db: &PgPool,
    user_id: Uuid,
    file_name: &str,
    analysis_result: &serde_json::Value,
    transactions_found: i64,
) -> anyhow::Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO card_analyses (user_id, file_name, analysis_result, transactions_found)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(file_name)
    .bind(analysis_result)
    .bind(transactions_found)
    .fetch_one(db)
    .await
    .context("insert card analysis")?;
    Ok(row.0)
}
