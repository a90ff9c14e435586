use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::dto::{GmailScanResponse, ScanParams, StatementScanResponse};
use super::services;
use crate::auth::AuthSession;
use crate::error::AppError;
use crate::state::AppState;

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/gmail", post(scan_gmail))
        .route("/scan/statement", post(scan_statement))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB statements
}

/// POST /scan/gmail: on-demand mailbox scan. Body is optional; window
/// parameters fall back to defaults and are clamped either way.
#[instrument(skip(state, session, params), fields(email = %session.email))]
pub async fn scan_gmail(
    State(state): State<AppState>,
    session: AuthSession,
    params: Option<Json<ScanParams>>,
) -> Result<Json<GmailScanResponse>, AppError> {
    let access_token = session.mailbox_token()?.to_string();
    let params = params.map(|Json(p)| p).unwrap_or_default();
    let response = services::run_gmail_scan(&state, &session, &access_token, params).await?;
    Ok(Json(response))
}

/// POST /scan/statement: multipart upload of a card statement as text.
#[instrument(skip(state, session, multipart), fields(email = %session.email))]
pub async fn scan_statement(
    State(state): State<AppState>,
    session: AuthSession,
    mut multipart: Multipart,
) -> Result<Json<StatementScanResponse>, AppError> {
    let mut file_name = String::from("statement.txt");
    let mut text: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            if let Some(name) = field.file_name() {
                file_name = name.to_string();
            }
            text = Some(field.text().await.map_err(|e| {
                AppError::Validation(format!("could not read uploaded file: {e}"))
            })?);
        }
    }

    let text = text.ok_or_else(|| AppError::Validation("file is required".into()))?;
    if text.trim().is_empty() {
        return Err(AppError::Validation("uploaded file is empty".into()));
    }

    let response = services::run_statement_scan(&state, &session, &file_name, &text).await?;
    Ok(Json(response))
}
