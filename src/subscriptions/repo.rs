use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// A tracked subscription row, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Option<String>,
    pub custom_name: String,
    pub amount: i64,
    pub currency: String,
    pub billing_cycle: String,
    pub billing_day: Option<i16>,
    pub next_billing_date: Option<String>,
    pub status: String,
    pub source: String,
    pub confidence: f64,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// List row: subscription plus display metadata joined from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionListItem {
    pub id: Uuid,
    pub service_id: Option<String>,
    pub custom_name: String,
    pub amount: i64,
    pub currency: String,
    pub billing_cycle: String,
    pub billing_day: Option<i16>,
    pub next_billing_date: Option<String>,
    pub status: String,
    pub source: String,
    pub confidence: f64,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub catalog_name: Option<String>,
    pub catalog_name_ko: Option<String>,
    pub catalog_category: Option<String>,
}

/// Insert parameters, validated by the handler before they get here.
#[derive(Debug)]
pub struct NewSubscription {
    pub service_id: Option<String>,
    pub custom_name: String,
    pub amount: i64,
    pub currency: String,
    pub billing_cycle: String,
    pub billing_day: Option<i16>,
    pub next_billing_date: Option<String>,
    pub status: String,
    pub source: String,
    pub confidence: f64,
    pub category: String,
    pub notes: Option<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Default)]
pub struct SubscriptionChanges {
    pub custom_name: Option<String>,
    pub amount: Option<i64>,
    pub billing_cycle: Option<String>,
    pub billing_day: Option<i16>,
    pub next_billing_date: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

const COLUMNS: &str = "id, user_id, service_id, custom_name, amount, currency, billing_cycle, \
     billing_day, next_billing_date, status, source, confidence, category, notes, \
     created_at, updated_at";

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<SubscriptionListItem>> {
    let rows = sqlx::query_as::<_, SubscriptionListItem>(
        r#"
        SELECT s.id, s.service_id, s.custom_name, s.amount, s.currency, s.billing_cycle,
               s.billing_day, s.next_billing_date, s.status, s.source, s.confidence,
               s.category, s.notes, s.created_at, s.updated_at,
               sc.name AS catalog_name, sc.name_ko AS catalog_name_ko,
               sc.category AS catalog_category
        FROM subscriptions s
        LEFT JOIN service_catalog sc ON s.service_id = sc.id
        WHERE s.user_id = $1
        ORDER BY s.status ASC, s.amount DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn insert(db: &PgPool, user_id: Uuid, new: &NewSubscription) -> anyhow::Result<Subscription> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        INSERT INTO subscriptions
            (user_id, service_id, custom_name, amount, currency, billing_cycle,
             billing_day, next_billing_date, status, source, confidence, category, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&new.service_id)
    .bind(&new.custom_name)
    .bind(new.amount)
    .bind(&new.currency)
    .bind(&new.billing_cycle)
    .bind(new.billing_day)
    .bind(&new.next_billing_date)
    .bind(&new.status)
    .bind(&new.source)
    .bind(new.confidence)
    .bind(&new.category)
    .bind(&new.notes)
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// COALESCE-style partial update, scoped to the owning user. Returns the
/// updated row, or None when no such row exists for this user.
pub async fn update_partial(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    changes: &SubscriptionChanges,
) -> anyhow::Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        UPDATE subscriptions SET
            custom_name = COALESCE($3, custom_name),
            amount = COALESCE($4, amount),
            billing_cycle = COALESCE($5, billing_cycle),
            billing_day = COALESCE($6, billing_day),
            next_billing_date = COALESCE($7, next_billing_date),
            status = COALESCE($8, status),
            category = COALESCE($9, category),
            notes = COALESCE($10, notes),
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(user_id)
    .bind(&changes.custom_name)
    .bind(changes.amount)
    .bind(&changes.billing_cycle)
    .bind(changes.billing_day)
    .bind(&changes.next_billing_date)
    .bind(&changes.status)
    .bind(&changes.category)
    .bind(&changes.notes)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Delete one subscription owned by `user_id`. True when a row went away.
pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// First subscription of this user whose display name contains `name`
/// (case-insensitive) or whose catalog reference equals `service_id`.
/// Backs the already-tracked check during reconciliation.
pub async fn find_tracked(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
    service_id: Option<&str>,
) -> anyhow::Result<Option<Uuid>> {
    let pattern = format!("%{}%", name.to_lowercase());
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM subscriptions
        WHERE user_id = $1 AND (LOWER(custom_name) LIKE $2 OR service_id = $3)
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(pattern)
    .bind(service_id.unwrap_or(""))
    .fetch_optional(db)
    .await?;
    Ok(row.map(|(id,)| id))
}
