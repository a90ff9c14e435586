use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// One row of the static service catalog. Seeded by migration, read-only
/// at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub name_ko: Option<String>,
    pub logo_url: Option<String>,
    pub category: Option<String>,
    pub website_url: Option<String>,
    pub typical_price_krw: Option<i64>,
    pub billing_cycle: Option<String>,
    pub email_sender: Option<String>,
}

const COLUMNS: &str =
    "id, name, name_ko, logo_url, category, website_url, typical_price_krw, billing_cycle, email_sender";

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<CatalogEntry>> {
    let rows = sqlx::query_as::<_, CatalogEntry>(&format!(
        "SELECT {COLUMNS} FROM service_catalog ORDER BY name"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Case-insensitive substring search over English and Korean names.
pub async fn search(db: &PgPool, query: &str) -> anyhow::Result<Vec<CatalogEntry>> {
    let pattern = format!("%{}%", query.to_lowercase());
    let rows = sqlx::query_as::<_, CatalogEntry>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM service_catalog
        WHERE LOWER(name) LIKE $1 OR LOWER(name_ko) LIKE $1
        ORDER BY name
        LIMIT 20
        "#
    ))
    .bind(pattern)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// First catalog row whose name contains `name`, if any. Order beyond that
/// is storage-defined; reconciliation takes whatever comes first.
pub async fn find_by_name(db: &PgPool, name: &str) -> anyhow::Result<Option<CatalogEntry>> {
    let pattern = format!("%{}%", name.to_lowercase());
    let row = sqlx::query_as::<_, CatalogEntry>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM service_catalog
        WHERE LOWER(name) LIKE $1 OR LOWER(name_ko) LIKE $1
        LIMIT 1
        "#
    ))
    .bind(pattern)
    .fetch_optional(db)
    .await?;
    Ok(row)
}
