use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::SubscriptionListItem;

/// Request body for creating a subscription, by hand or by adopting a
/// discovered candidate (which supplies `service_name`).
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub service_id: Option<String>,
    pub custom_name: Option<String>,
    pub service_name: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<String>,
    pub billing_day: Option<i16>,
    pub next_billing_date: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

/// Partial update body; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub custom_name: Option<String>,
    pub amount: Option<i64>,
    pub billing_cycle: Option<String>,
    pub billing_day: Option<i16>,
    pub next_billing_date: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionListItem>,
    pub summary: SpendingSummary,
}

/// Monthly-normalized spend across the user's active subscriptions.
#[derive(Debug, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub total: usize,
    pub active: usize,
    pub monthly_total: i64,
    pub yearly_total: i64,
}

impl SpendingSummary {
    pub fn compute(rows: &[SubscriptionListItem]) -> Self {
        let monthly_total = rows
            .iter()
            .filter(|s| s.status == "active")
            .map(|s| monthly_equivalent(s.amount, &s.billing_cycle))
            .sum();
        Self {
            total: rows.len(),
            active: rows.iter().filter(|s| s.status == "active").count(),
            monthly_total,
            yearly_total: monthly_total * 12,
        }
    }
}

fn monthly_equivalent(amount: i64, billing_cycle: &str) -> i64 {
    match billing_cycle {
        "yearly" => (amount as f64 / 12.0).round() as i64,
        "weekly" => amount * 4,
        _ => amount,
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod summary_tests {
    use super::*;
    use time::OffsetDateTime;

    fn item(amount: i64, billing_cycle: &str, status: &str) -> SubscriptionListItem {
        SubscriptionListItem {
            id: Uuid::new_v4(),
            service_id: None,
            custom_name: "x".into(),
            amount,
            currency: "KRW".into(),
            billing_cycle: billing_cycle.into(),
            billing_day: None,
            next_billing_date: None,
            status: status.into(),
            source: "manual".into(),
            confidence: 1.0,
            category: None,
            notes: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            catalog_name: None,
            catalog_name_ko: None,
            catalog_category: None,
        }
    }

    #[test]
    fn summary_normalizes_cycles_to_monthly() {
        let rows = vec![
            item(17_000, "monthly", "active"),
            item(120_000, "yearly", "active"),
            item(2_500, "weekly", "active"),
        ];
        let summary = SpendingSummary::compute(&rows);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.active, 3);
        // 17000 + 10000 + 10000
        assert_eq!(summary.monthly_total, 37_000);
        assert_eq!(summary.yearly_total, 444_000);
    }

    #[test]
    fn summary_skips_inactive_rows() {
        let rows = vec![
            item(17_000, "monthly", "active"),
            item(99_000, "monthly", "paused"),
            item(10_900, "monthly", "cancelled"),
        ];
        let summary = SpendingSummary::compute(&rows);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.active, 1);
        assert_eq!(summary.monthly_total, 17_000);
    }

    #[test]
    fn summary_of_nothing_is_zero() {
        let summary = SpendingSummary::compute(&[]);
        assert_eq!(
            summary,
            SpendingSummary {
                total: 0,
                active: 0,
                monthly_total: 0,
                yearly_total: 0
            }
        );
    }

    #[test]
    fn yearly_amounts_round_to_nearest_won() {
        let rows = vec![item(100_000, "yearly", "active")];
        // 100000 / 12 = 8333.33…
        assert_eq!(SpendingSummary::compute(&rows).monthly_total, 8_333);
    }
}
