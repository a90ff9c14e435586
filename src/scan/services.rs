use std::collections::HashMap;

use sqlx::PgPool;
use time::{Date, Month, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{
    EnrichedCandidate, FetchFailure, GmailScanResponse, ScanParams, StatementScanResponse,
};
use super::repo;
use crate::auth::repo::User;
use crate::auth::AuthSession;
use crate::catalog;
use crate::error::AppError;
use crate::extract::dedupe::dedupe;
use crate::extract::generative;
use crate::extract::patterns;
use crate::extract::types::Candidate;
use crate::mailbox::{EmailRecord, SearchOptions};
use crate::state::AppState;
use crate::subscriptions;

const DEFAULT_MAX_RESULTS: usize = 200;
const MAX_RESULTS_MIN: usize = 50;
const MAX_RESULTS_MAX: usize = 1000;
const DEFAULT_SCAN_MONTHS: u32 = 6;
const SCAN_MONTHS_MIN: u32 = 1;
const SCAN_MONTHS_MAX: u32 = 24;

/// End-to-end mailbox scan for one user: resolve the user, search, fetch
/// details with per-message failure isolation, extract, dedupe, reconcile.
pub async fn run_gmail_scan(
    state: &AppState,
    session: &AuthSession,
    access_token: &str,
    params: ScanParams,
) -> Result<GmailScanResponse, AppError> {
    let max_results = params
        .max_results
        .unwrap_or(DEFAULT_MAX_RESULTS)
        .clamp(MAX_RESULTS_MIN, MAX_RESULTS_MAX);
    let scan_months = params
        .scan_months
        .unwrap_or(DEFAULT_SCAN_MONTHS)
        .clamp(SCAN_MONTHS_MIN, SCAN_MONTHS_MAX);

    // Resolve the user and store the freshest mailbox credential.
    let user = match User::find_by_email(&state.db, &session.email).await? {
        Some(user) => {
            User::refresh_access_token(&state.db, user.id, access_token).await?;
            user
        }
        None => User::create(&state.db, session, Some(access_token)).await?,
    };

    let after = lookback_start(OffsetDateTime::now_utc().date(), scan_months);
    let references = state
        .mailbox
        .search(
            access_token,
            SearchOptions {
                max_results,
                after: Some(after),
            },
        )
        .await?;

    if references.is_empty() {
        info!(user_id = %user.id, scan_months, "scan found no matching emails");
        return Ok(GmailScanResponse {
            subscriptions: Vec::new(),
            emails_found: 0,
            emails_scanned: 0,
            emails_failed: 0,
            scan_months,
            message: "No subscription emails were found in the scanned window.".into(),
        });
    }

    // Sequential detail fetch, source order. One message failing must not
    // abort the scan; failures are collected, logged and counted.
    let mut details: Vec<EmailRecord> = Vec::new();
    let mut by_id: HashMap<String, EmailRecord> = HashMap::new();
    let mut failures: Vec<FetchFailure> = Vec::new();
    for reference in &references {
        match state.mailbox.fetch_detail(access_token, &reference.id).await {
            Ok(detail) => {
                repo::record_email_seen(&state.db, user.id, &detail).await?;
                by_id.insert(detail.id.clone(), detail.clone());
                details.push(detail);
            }
            Err(e) => {
                failures.push(FetchFailure {
                    message_id: reference.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    for failure in &failures {
        warn!(
            message_id = %failure.message_id,
            reason = %failure.reason,
            "message detail fetch failed, excluded from scan"
        );
    }

    let candidates = match &state.model {
        Some(model) => {
            generative::analyze_emails(model.as_ref(), &details, state.config.usd_krw_rate).await
        }
        None => patterns::detect(&details, state.config.usd_krw_rate),
    };
    let candidates = dedupe(candidates);

    let mut subscriptions = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let source = candidate.email_id.as_deref().and_then(|id| by_id.get(id));
        subscriptions.push(reconcile(&state.db, user.id, candidate, source).await?);
    }

    info!(
        user_id = %user.id,
        emails_found = references.len(),
        emails_scanned = details.len(),
        emails_failed = failures.len(),
        discovered = subscriptions.len(),
        "gmail scan complete"
    );
    let message = format!(
        "Analyzed {} emails and discovered {} subscriptions.",
        details.len(),
        subscriptions.len()
    );
    Ok(GmailScanResponse {
        subscriptions,
        emails_found: references.len(),
        emails_scanned: details.len(),
        emails_failed: failures.len(),
        scan_months,
        message,
    })
}

/// Statement scan: no mailbox involved, so no provenance and no pagination.
/// The raw text is analyzed and dropped; only the result row persists.
pub async fn run_statement_scan(
    state: &AppState,
    session: &AuthSession,
    file_name: &str,
    text: &str,
) -> Result<StatementScanResponse, AppError> {
    let user = User::find_by_email(&state.db, &session.email)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let candidates = match &state.model {
        Some(model) => generative::analyze_statement(model.as_ref(), text).await,
        None => {
            warn!("no generative backend configured, statement analysis yields nothing");
            Vec::new()
        }
    };

    let analysis_result = serde_json::to_value(&candidates).map_err(anyhow::Error::from)?;
    let analysis_id = repo::insert_card_analysis(
        &state.db,
        user.id,
        file_name,
        &analysis_result,
        candidates.len() as i64,
    )
    .await?;

    let transactions_found = candidates.len();
    let mut subscriptions = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        subscriptions.push(reconcile(&state.db, user.id, candidate, None).await?);
    }

    info!(user_id = %user.id, %analysis_id, transactions_found, "statement analysis complete");
    let message = format!("Found {transactions_found} recurring payments in the statement.");
    Ok(StatementScanResponse {
        subscriptions,
        analysis_id,
        transactions_found,
        message,
    })
}

/// Match one candidate against the catalog and the user's tracked rows, and
/// attach source-message provenance when we have it.
async fn reconcile(
    db: &PgPool,
    user_id: Uuid,
    candidate: Candidate,
    source: Option<&EmailRecord>,
) -> Result<EnrichedCandidate, AppError> {
    let catalog_entry = catalog::repo::find_by_name(db, &candidate.service_name).await?;
    let existing = subscriptions::repo::find_tracked(
        db,
        user_id,
        &candidate.service_name,
        catalog_entry.as_ref().map(|entry| entry.id.as_str()),
    )
    .await?;

    let gmail_link = candidate
        .email_id
        .as_deref()
        .map(|id| format!("https://mail.google.com/mail/u/0/#inbox/{id}"));

    Ok(EnrichedCandidate {
        already_tracked: existing.is_some(),
        existing_id: existing,
        catalog: catalog_entry,
        gmail_link,
        source_subject: source.map(|e| e.subject.clone()),
        source_date: source.map(|e| e.date.clone()),
        source_from: source.map(|e| e.from.clone()),
        candidate,
    })
}

/// First day covered by a lookback of `months` calendar months from
/// `today`, clamping the day to the target month's length.
fn lookback_start(today: Date, months: u32) -> Date {
    let total = today.year() * 12 + today.month() as i32 - 1 - months as i32;
    let year = total.div_euclid(12);
    let month = match Month::try_from((total.rem_euclid(12) + 1) as u8) {
        Ok(month) => month,
        Err(_) => return today,
    };
    let day = today.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn lookback_subtracts_calendar_months() {
        assert_eq!(lookback_start(date!(2025 - 08 - 08), 6), date!(2025 - 02 - 08));
        assert_eq!(lookback_start(date!(2025 - 08 - 08), 1), date!(2025 - 07 - 08));
    }

    #[test]
    fn lookback_wraps_across_years() {
        assert_eq!(lookback_start(date!(2025 - 01 - 15), 2), date!(2024 - 11 - 15));
        assert_eq!(lookback_start(date!(2025 - 03 - 01), 24), date!(2023 - 03 - 01));
    }

    #[test]
    fn lookback_clamps_to_month_length() {
        assert_eq!(lookback_start(date!(2025 - 03 - 31), 1), date!(2025 - 02 - 28));
        assert_eq!(lookback_start(date!(2024 - 03 - 31), 1), date!(2024 - 02 - 29));
        assert_eq!(lookback_start(date!(2025 - 07 - 31), 1), date!(2025 - 06 - 30));
    }
}
