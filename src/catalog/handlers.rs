use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::repo::{self, CatalogEntry};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub services: Vec<CatalogEntry>,
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new().route("/catalog", get(search_catalog))
}

/// Catalog lookups back the "add subscription" picker; no session needed
/// for reference data.
#[instrument(skip(state))]
pub async fn search_catalog(
    State(state): State<AppState>,
    Query(params): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>, AppError> {
    let services = match params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => repo::search(&state.db, query).await?,
        None => repo::list_all(&state.db).await?,
    };
    Ok(Json(CatalogResponse { services }))
}
