use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::repo::CatalogEntry;
use crate::extract::types::Candidate;

/// Caller-tunable scan window; everything is clamped server-side.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct ScanParams {
    pub max_results: Option<usize>,
    pub scan_months: Option<u32>,
}

/// A candidate merged with catalog metadata, tracking state, and (for email
/// scans) provenance of the originating message.
#[derive(Debug, Serialize)]
pub struct EnrichedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub catalog: Option<CatalogEntry>,
    pub already_tracked: bool,
    pub existing_id: Option<Uuid>,
    pub gmail_link: Option<String>,
    pub source_subject: Option<String>,
    pub source_date: Option<String>,
    pub source_from: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GmailScanResponse {
    pub subscriptions: Vec<EnrichedCandidate>,
    pub emails_found: usize,
    pub emails_scanned: usize,
    pub emails_failed: usize,
    pub scan_months: u32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatementScanResponse {
    pub subscriptions: Vec<EnrichedCandidate>,
    pub analysis_id: Uuid,
    pub transactions_found: usize,
    pub message: String,
}

/// A message reference whose detail fetch failed. Collected per scan so the
/// outcome is visible, not just a log line.
#[derive(Debug)]
pub struct FetchFailure {
    pub message_id: String,
    pub reason: String,
}
